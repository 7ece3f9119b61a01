//! Foundation types shared by every component of the coarray runtime:
//! status codes, the internal error type, image/team identities and
//! process-lifetime configuration.
//!
//! Nothing in this crate touches MPI beyond the `mpi::Rank`-shaped newtypes
//! in [`ids`]; the actual communicator/window ownership lives in
//! `cafrt-window` and `cafrt-team`.

pub mod config;
pub mod error;
pub mod ids;
pub mod status;

pub use config::Config;
pub use error::{CafError, CafResult};
pub use ids::{ImageId, RunningAccessId, TeamId, TeamLevel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_id_rank_roundtrip() {
        let id = ImageId(3);
        assert_eq!(id.as_rank(), 2);
        assert_eq!(ImageId::from_rank(id.as_rank()), id);
    }

    #[test]
    fn error_to_stat_matches_spec_table() {
        assert_eq!(CafError::InvalidRank.to_stat(), status::INVALID_RANK);
        assert_eq!(
            CafError::StoppedImage(2).to_stat(),
            status::STAT_STOPPED_IMAGE
        );
        assert_eq!(
            CafError::DupSyncImages.to_stat(),
            status::STAT_DUP_SYNC_IMAGES
        );
    }

    #[test]
    fn fatal_classification() {
        assert!(CafError::Fatal("corrupt token list".into()).is_fatal());
        assert!(!CafError::OutOfBounds.is_fatal());
    }
}
