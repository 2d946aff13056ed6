//! Asynchronous tuner event types.
//!
//! Events are emitted by tuner backends through a [`tokio::sync::broadcast`]
//! channel when the hardware reports a condition outside the normal sample
//! flow. The radio control session subscribes and republishes them; the
//! server reacts (overload is advisory, removal is fatal).

/// An event emitted by a tuner backend's hardware event channel.
///
/// Delivered on a best-effort basis through a bounded broadcast channel;
/// slow consumers may miss events under load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerEvent {
    /// The ADC input overload condition changed.
    ///
    /// Advisory only: logged, never escalated.
    Overload {
        /// `true` when the overload condition is present.
        active: bool,
    },

    /// The device disappeared from the host while running.
    ///
    /// Fatal: forces an orderly server shutdown.
    DeviceRemoved,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_comparable() {
        assert_eq!(
            TunerEvent::Overload { active: true },
            TunerEvent::Overload { active: true }
        );
        assert_ne!(
            TunerEvent::Overload { active: true },
            TunerEvent::Overload { active: false }
        );
        assert_ne!(
            TunerEvent::Overload { active: true },
            TunerEvent::DeviceRemoved
        );
    }
}
