//! The live streaming tail is an external collaborator; this crate only
//! specifies the boundary the back-fill engine hands off to once both
//! sweeps complete.

use async_trait::async_trait;

/// Receives control once the back-fill engine has caught the store up to
/// the upstream's last irreversible block at start-up.
///
/// Implementations own however they keep tailing past that point (polling,
/// a push subscription, etc.) — this crate only calls [`Self::resume_from`]
/// and does not implement it.
#[async_trait]
pub trait LiveTail: Send + Sync {
    /// Hands off control at the given height, the last block the back-fill
    /// engine wrote.
    async fn resume_from(&self, last_written: i64) -> eyre::Result<()>;
}

/// A no-op tail used when no live-streaming collaborator is configured. The
/// engine still invokes the interface on hand-off even when nothing is
/// wired up to receive it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLiveTail;

#[async_trait]
impl LiveTail for NoopLiveTail {
    async fn resume_from(&self, _last_written: i64) -> eyre::Result<()> {
        Ok(())
    }
}
