//! An indexed upload.
//!
//! A row only exists once the bytes it describes have been stored.

use std::str::FromStr;

use chrono::{TimeZone, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;

use crate::error::{ServerError, ServerResult};
use hatch::api::v1::upload::UploadRecord;
use hatch::bucket::Bucket;
use hatch::hash::Hash;
use hatch::id::UploadId;

pub type UploadModel = Model;

/// An indexed upload.
#[derive(Debug, Clone, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "uploads")]
pub struct Model {
    /// The opaque ID of the upload.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The bucket the object is stored in.
    pub bucket: String,

    /// Hex-encoded SHA-256 hash of the stored bytes.
    ///
    /// This is also the key of the object in the bucket.
    #[sea_orm(indexed)]
    pub hash: String,

    /// The client-supplied file name.
    pub filename: String,

    /// The sniffed MIME type.
    pub mime: String,

    /// ID of the user who uploaded the file.
    #[sea_orm(indexed)]
    pub uploader: i64,

    /// Timestamp when the upload was indexed.
    pub upload_ts: ChronoDateTimeUtc,

    /// Size of the stored object.
    pub size: i64,

    pub width: Option<i32>,

    pub height: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::Uploader",
        to = "super::user::Column::Id"
    )]
    Uploader,
}

impl Model {
    /// Returns the bucket of this upload.
    pub fn bucket(&self) -> ServerResult<Bucket> {
        Bucket::from_str(&self.bucket).map_err(ServerError::database_error)
    }

    /// Returns the object key of this upload.
    pub fn key(&self) -> ServerResult<Hash> {
        Hash::from_base16(&self.hash).map_err(ServerError::database_error)
    }

    /// Converts this row to its wire representation.
    pub fn to_record(&self) -> ServerResult<UploadRecord> {
        Ok(UploadRecord {
            id: UploadId::new(self.id.clone()).map_err(ServerError::database_error)?,
            bucket: self.bucket()?,
            content_hash: Some(self.key()?),
            filename: self.filename.clone(),
            mime: self.mime.clone(),
            uploader_id: self.uploader,
            upload_timestamp: Some(self.upload_ts.timestamp()),
            size_bytes: Some(self.size.try_into().map_err(ServerError::database_error)?),
            width: self.width.map(|w| w as u32),
            height: self.height.map(|h| h as u32),
        })
    }
}

impl ActiveModel {
    /// Creates a row for a record whose bytes have been stored.
    pub fn from_record(record: &UploadRecord) -> ServerResult<Self> {
        let (hash, size, ts) = match (
            &record.content_hash,
            record.size_bytes,
            record.upload_timestamp,
        ) {
            (Some(hash), Some(size), Some(ts)) => (hash, size, ts),
            _ => {
                return Err(ServerError::DatabaseError(anyhow::anyhow!(
                    "Refusing to index provisional upload {}",
                    record.id
                )));
            }
        };

        let upload_ts = Utc
            .timestamp_opt(ts, 0)
            .single()
            .ok_or_else(|| ServerError::DatabaseError(anyhow::anyhow!("Bad timestamp {}", ts)))?;

        Ok(Self {
            id: Set(record.id.as_str().to_owned()),
            bucket: Set(record.bucket.as_str().to_owned()),
            hash: Set(hash.to_base16()),
            filename: Set(record.filename.clone()),
            mime: Set(record.mime.clone()),
            uploader: Set(record.uploader_id),
            upload_ts: Set(upload_ts),
            size: Set(size.try_into().map_err(ServerError::database_error)?),
            width: Set(record.width.map(|w| w as i32)),
            height: Set(record.height.map(|h| h as i32)),
        })
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Uploader.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
