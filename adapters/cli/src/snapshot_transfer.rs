use std::{error::Error, fmt};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use monument_core::MilestoneBlockRange;

const SNAPSHOT_DOMAIN: &str = "monument";
const SNAPSHOT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded snapshot payload.
pub(crate) const SNAPSHOT_HEADER: &str = "monument:v1";
/// Delimiter used to separate the prefix, block total and payload.
const FIELD_DELIMITER: char = ':';

/// Persisted construction progress: a cumulative block total and the eras it was earned in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ProgressSnapshot {
    /// Cumulative number of blocks earned.
    pub total: u64,
    /// Contiguous cumulative block ranges and their eras, in block order.
    pub ranges: Vec<MilestoneBlockRange>,
}

impl ProgressSnapshot {
    /// Encodes the snapshot into a single-line string suitable for clipboard transfer.
    pub(crate) fn encode(&self) -> Result<String, SnapshotTransferError> {
        let json = serde_json::to_vec(&self.ranges).map_err(SnapshotTransferError::InvalidPayload)?;
        let encoded = STANDARD_NO_PAD.encode(json);
        Ok(format!("{SNAPSHOT_HEADER}:{}:{encoded}", self.total))
    }

    /// Decodes a snapshot from the provided string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, SnapshotTransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(SnapshotTransferError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(SnapshotTransferError::MissingPrefix)?;
        let version = parts.next().ok_or(SnapshotTransferError::MissingVersion)?;
        let total = parts.next().ok_or(SnapshotTransferError::MissingTotal)?;
        let payload = parts.next().ok_or(SnapshotTransferError::MissingPayload)?;

        if domain != SNAPSHOT_DOMAIN {
            return Err(SnapshotTransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotTransferError::UnsupportedVersion(version.to_owned()));
        }

        let total = total
            .trim()
            .parse::<u64>()
            .map_err(|_| SnapshotTransferError::InvalidTotal(total.to_owned()))?;
        let bytes = STANDARD_NO_PAD
            .decode(payload.as_bytes())
            .map_err(SnapshotTransferError::InvalidEncoding)?;
        let ranges: Vec<MilestoneBlockRange> =
            serde_json::from_slice(&bytes).map_err(SnapshotTransferError::InvalidPayload)?;
        validate_ranges(&ranges)?;

        Ok(Self { total, ranges })
    }
}

/// Errors that can occur while decoding progress transfer strings.
#[derive(Debug)]
pub(crate) enum SnapshotTransferError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing from the encoded snapshot.
    MissingPrefix,
    /// The encoded snapshot did not contain a version segment.
    MissingVersion,
    /// The encoded snapshot did not include the block total.
    MissingTotal,
    /// The encoded snapshot did not include the payload segment.
    MissingPayload,
    /// The encoded snapshot used an unexpected prefix segment.
    InvalidPrefix(String),
    /// The encoded snapshot used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The block total could not be parsed.
    InvalidTotal(String),
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The payload could not be serialised or deserialised.
    InvalidPayload(serde_json::Error),
    /// A range ends before it starts or overlaps its predecessor.
    InvalidRange(MilestoneBlockRange),
}

impl fmt::Display for SnapshotTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "snapshot string was empty"),
            Self::MissingPrefix => write!(f, "snapshot string is missing the prefix"),
            Self::MissingVersion => write!(f, "snapshot string is missing the version"),
            Self::MissingTotal => write!(f, "snapshot string is missing the block total"),
            Self::MissingPayload => write!(f, "snapshot string is missing the payload"),
            Self::InvalidPrefix(prefix) => {
                write!(f, "snapshot prefix '{prefix}' is not supported")
            }
            Self::UnsupportedVersion(version) => {
                write!(f, "snapshot version '{version}' is not supported")
            }
            Self::InvalidTotal(total) => write!(f, "could not parse block total '{total}'"),
            Self::InvalidEncoding(error) => {
                write!(f, "could not decode snapshot payload: {error}")
            }
            Self::InvalidPayload(error) => {
                write!(f, "could not process snapshot payload: {error}")
            }
            Self::InvalidRange(range) => write!(
                f,
                "era range {}..{} is out of order",
                range.start_block, range.end_block
            ),
        }
    }
}

impl Error for SnapshotTransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            Self::InvalidPayload(error) => Some(error),
            _ => None,
        }
    }
}

fn validate_ranges(ranges: &[MilestoneBlockRange]) -> Result<(), SnapshotTransferError> {
    let mut previous_end = 0;
    for range in ranges {
        if range.end_block < range.start_block || range.start_block < previous_end {
            return Err(SnapshotTransferError::InvalidRange(*range));
        }
        previous_end = range.end_block;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use monument_core::EraIndex;

    #[test]
    fn round_trip_without_history() {
        let snapshot = ProgressSnapshot {
            total: 42,
            ranges: Vec::new(),
        };

        let encoded = snapshot.encode().expect("snapshot encodes");
        assert!(encoded.starts_with(&format!("{SNAPSHOT_HEADER}:42:")));

        let decoded = ProgressSnapshot::decode(&encoded).expect("snapshot decodes");
        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn round_trip_with_era_history() {
        let snapshot = ProgressSnapshot {
            total: 1000,
            ranges: vec![
                MilestoneBlockRange::new(0, 820, EraIndex::new(0)),
                MilestoneBlockRange::new(820, 2000, EraIndex::new(1)),
            ],
        };

        let encoded = snapshot.encode().expect("snapshot encodes");
        let decoded =
            ProgressSnapshot::decode(&format!("  {encoded}\n")).expect("snapshot decodes");
        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn rejects_foreign_prefixes_and_versions() {
        assert!(matches!(
            ProgressSnapshot::decode("fortress:v1:3:W10"),
            Err(SnapshotTransferError::InvalidPrefix(prefix)) if prefix == "fortress"
        ));
        assert!(matches!(
            ProgressSnapshot::decode("monument:v9:3:W10"),
            Err(SnapshotTransferError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            ProgressSnapshot::decode("   "),
            Err(SnapshotTransferError::EmptyPayload)
        ));
    }

    #[test]
    fn rejects_malformed_fields() {
        assert!(matches!(
            ProgressSnapshot::decode("monument:v1"),
            Err(SnapshotTransferError::MissingTotal)
        ));
        assert!(matches!(
            ProgressSnapshot::decode("monument:v1:12"),
            Err(SnapshotTransferError::MissingPayload)
        ));
        assert!(matches!(
            ProgressSnapshot::decode("monument:v1:-4:W10"),
            Err(SnapshotTransferError::InvalidTotal(_))
        ));
        let error = ProgressSnapshot::decode("monument:v1:4:!!!").expect_err("bad base64");
        assert!(error.source().is_some());
    }

    #[test]
    fn rejects_overlapping_ranges() {
        let snapshot = ProgressSnapshot {
            total: 10,
            ranges: vec![
                MilestoneBlockRange::new(0, 6, EraIndex::new(0)),
                MilestoneBlockRange::new(4, 10, EraIndex::new(1)),
            ],
        };
        let encoded = snapshot.encode().expect("snapshot encodes");
        assert!(matches!(
            ProgressSnapshot::decode(&encoded),
            Err(SnapshotTransferError::InvalidRange(range)) if range.start_block == 4
        ));
    }
}
