//! Storage buckets.
//!
//! Every stored object lives in one of a fixed set of logical buckets.
//! A bucket is a namespace only: keys inside a bucket are always content
//! hashes, so the same bytes uploaded twice into one bucket share a blob.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Serialize};

use crate::error::{HatchError, HatchResult};

/// A logical bucket in the object store.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Bucket {
    /// Project archives.
    Projects,

    /// Project thumbnails.
    Thumbnails,

    /// Profile pictures.
    Pfps,
}

impl Bucket {
    /// Returns the canonical name of the bucket.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Thumbnails => "thumbnails",
            Self::Pfps => "pfps",
        }
    }

    /// Returns whether objects in this bucket are images.
    pub const fn holds_images(&self) -> bool {
        matches!(self, Self::Thumbnails | Self::Pfps)
    }

    /// Returns all buckets.
    pub const fn all() -> [Self; 3] {
        [Self::Projects, Self::Thumbnails, Self::Pfps]
    }
}

impl FromStr for Bucket {
    type Err = HatchError;

    fn from_str(name: &str) -> HatchResult<Self> {
        match name {
            "projects" => Ok(Self::Projects),
            "thumbnails" => Ok(Self::Thumbnails),
            "pfps" => Ok(Self::Pfps),
            _ => Err(HatchError::InvalidBucket {
                name: name.to_owned(),
            }),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Bucket {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Bucket {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        use de::Error;

        String::deserialize(deserializer)
            .and_then(|s| Self::from_str(&s).map_err(|e| Error::custom(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_names() {
        for bucket in Bucket::all() {
            assert_eq!(bucket, Bucket::from_str(bucket.as_str()).unwrap());
        }

        assert!(matches!(
            Bucket::from_str("Projects"),
            Err(HatchError::InvalidBucket { name }) if name == "Projects"
        ));
        assert!(Bucket::from_str("").is_err());
    }

    #[test]
    fn test_bucket_serde() {
        let json = serde_json::to_string(&Bucket::Thumbnails).unwrap();
        assert_eq!("\"thumbnails\"", json);

        let bucket: Bucket = serde_json::from_str("\"pfps\"").unwrap();
        assert_eq!(Bucket::Pfps, bucket);

        assert!(serde_json::from_str::<Bucket>("\"nope\"").is_err());
    }

    #[test]
    fn test_holds_images() {
        assert!(!Bucket::Projects.holds_images());
        assert!(Bucket::Thumbnails.holds_images());
        assert!(Bucket::Pfps.holds_images());
    }
}
