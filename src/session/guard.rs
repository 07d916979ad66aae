//! Keyboard-unlock guard run before reads and writes.
//!
//! 5250 screens often stop in a message-wait state that only Enter clears.
//! Before touching the screen, wait for input readiness; if the OIA still
//! reports the keyboard as inhibited, press Enter and wait once more. There
//! is no further retry: whatever the host reports after the second wait
//! stands.

use std::time::Duration;

use tracing::{debug, trace};

use crate::error::Result;
use crate::host::{InhibitStatus, OperatorInfoArea, PresentationSpace, millis};
use crate::input::Key;

/// What the guard had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The keyboard was free after the first wait.
    Ready,
    /// The keyboard was inhibited; Enter was pressed and readiness re-polled.
    Unlocked(InhibitStatus),
}

/// Wait for input readiness, pressing Enter once if the keyboard is locked.
pub fn ensure_input_ready<P, O>(ps: &P, oia: &O, wait: Duration) -> Result<GuardOutcome>
where
    P: PresentationSpace + ?Sized,
    O: OperatorInfoArea + ?Sized,
{
    let timeout_ms = millis(wait);

    let ready = oia.wait_for_input_ready(timeout_ms)?;
    trace!(ready, timeout_ms, "input ready poll");

    let status = InhibitStatus::from_code(oia.input_inhibited()?);
    if !status.is_inhibited() {
        return Ok(GuardOutcome::Ready);
    }

    debug!(?status, "keyboard inhibited, sending Enter");
    ps.send_keys(&Key::Enter.to_mnemonic()?)?;
    let ready = oia.wait_for_input_ready(timeout_ms)?;
    trace!(ready, timeout_ms, "input ready poll after Enter");

    Ok(GuardOutcome::Unlocked(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Host;
    use crate::host::mock::{Call, MockHost, MockOia, MockPresentationSpace};

    fn bound(host: &mut MockHost) -> (MockPresentationSpace, MockOia) {
        host.refresh_connections().unwrap();
        host.bind("A".parse().unwrap()).unwrap()
    }

    #[test]
    fn test_free_keyboard_polls_once() {
        let mut host = MockHost::new().with_connection('A');
        let (ps, oia) = bound(&mut host);
        host.clear_calls();

        let outcome = ensure_input_ready(&ps, &oia, Duration::from_secs(2)).unwrap();

        assert_eq!(outcome, GuardOutcome::Ready);
        assert_eq!(
            host.calls(),
            vec![Call::WaitForInputReady(2000), Call::InputInhibited]
        );
    }

    #[test]
    fn test_inhibited_keyboard_gets_one_enter() {
        let mut host = MockHost::new().with_connection('A').with_inhibited(&[1, 0]);
        let (ps, oia) = bound(&mut host);
        host.clear_calls();

        let outcome = ensure_input_ready(&ps, &oia, Duration::from_millis(500)).unwrap();

        assert_eq!(outcome, GuardOutcome::Unlocked(InhibitStatus::SystemWait));
        assert_eq!(
            host.calls(),
            vec![
                Call::WaitForInputReady(500),
                Call::InputInhibited,
                Call::SendKeys("[enter]".to_string()),
                Call::WaitForInputReady(500),
            ]
        );
    }

    #[test]
    fn test_no_second_enter_when_still_locked() {
        let mut host = MockHost::new()
            .with_connection('A')
            .with_inhibited(&[5, 5, 5])
            .with_input_never_ready();
        let (ps, oia) = bound(&mut host);

        ensure_input_ready(&ps, &oia, Duration::from_secs(1)).unwrap();

        assert_eq!(host.keys_sent(), vec!["[enter]"]);
        assert_eq!(host.readiness_polls(), 2);
    }
}
