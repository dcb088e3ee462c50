//! Bring one device to its desired relay state.

use crate::device::DeviceHandle;

/// What [`reconcile`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Toggled,
    AlreadyInState,
    DeviceUnreachable,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Toggled => write!(f, "toggled"),
            Outcome::AlreadyInState => write!(f, "already in state"),
            Outcome::DeviceUnreachable => write!(f, "unreachable"),
        }
    }
}

/// Send at most one command so the relay matches `desired_on`.
///
/// Never fails: a missing handle or a rejected command is reported as
/// [`Outcome::DeviceUnreachable`] and logged.
pub fn reconcile(handle: Option<&mut dyn DeviceHandle>, desired_on: bool) -> Outcome {
    let Some(handle) = handle else {
        return Outcome::DeviceUnreachable;
    };

    if handle.is_on() == desired_on {
        log_decorated!(
            "{} | Light is already {}",
            handle.alias(),
            if desired_on { "on" } else { "off" }
        );
        return Outcome::AlreadyInState;
    }

    let result = if desired_on {
        handle.turn_on()
    } else {
        handle.turn_off()
    };

    match result {
        Ok(()) => {
            log_decorated!(
                "{} | Turned light {}",
                handle.alias(),
                if desired_on { "on" } else { "off" }
            );
            Outcome::Toggled
        }
        Err(e) => {
            log_error!("{} | Could not switch {}: {e}", handle.alias(), handle.address());
            Outcome::DeviceUnreachable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGateway;

    #[test]
    fn test_toggle_then_already_in_state() {
        let gateway = FakeGateway::new().with_device("10.0.0.1", "Kitchen", false);
        let mut handle = gateway.handle("10.0.0.1");

        assert_eq!(reconcile(Some(handle.as_mut()), true), Outcome::Toggled);
        assert_eq!(reconcile(Some(handle.as_mut()), true), Outcome::AlreadyInState);
        assert_eq!(gateway.commands("10.0.0.1"), 1);
        assert!(gateway.is_on("10.0.0.1"));
    }

    #[test]
    fn test_turns_off_when_not_needed() {
        let gateway = FakeGateway::new().with_device("10.0.0.1", "Kitchen", true);
        let mut handle = gateway.handle("10.0.0.1");

        assert_eq!(reconcile(Some(handle.as_mut()), false), Outcome::Toggled);
        assert!(!gateway.is_on("10.0.0.1"));
    }

    #[test]
    fn test_missing_handle_is_unreachable() {
        assert_eq!(reconcile(None, true), Outcome::DeviceUnreachable);
    }

    #[test]
    fn test_failed_command_is_unreachable() {
        let gateway = FakeGateway::new().with_device("10.0.0.1", "Kitchen", false);
        let mut handle = gateway.handle("10.0.0.1");
        gateway.fail_commands("10.0.0.1");

        assert_eq!(reconcile(Some(handle.as_mut()), true), Outcome::DeviceUnreachable);
        assert!(!gateway.is_on("10.0.0.1"));
        assert_eq!(reconcile(Some(handle.as_mut()), false), Outcome::AlreadyInState);
    }
}
