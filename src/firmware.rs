//! Firmware staging and reboot facility.

/// Hooks into the device's firmware staging and boot-switch machinery.
///
/// The update command stages an already-uploaded image file and schedules a
/// reboot; the module calls `save_state` and then `reboot` once the grace
/// period has elapsed. `reboot` is expected not to return on real hardware;
/// test doubles may record the call instead.
pub trait Firmware {
    /// Register the named file as the image to boot next. Failures are the
    /// implementation's to report; the update protocol carries no error
    /// reply for this command.
    fn stage(&mut self, path: &str);

    /// Persist pending host state before the device goes down.
    fn save_state(&mut self);

    /// Restart the device.
    fn reboot(&mut self);
}
