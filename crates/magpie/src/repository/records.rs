//! Row types mapping store tables to domain models.

use diesel::prelude::*;

use super::{fmt_datetime, fmt_datetime_opt, parse_datetime, parse_datetime_opt};
use crate::models::{HeaderPairs, Link, Snapshot, Source, Url};

fn headers_to_json(headers: &HeaderPairs) -> String {
    serde_json::to_string(headers).unwrap_or_else(|_| "[]".to_string())
}

fn headers_from_json(json: &str) -> Result<HeaderPairs, diesel::result::Error> {
    serde_json::from_str(json)
        .map_err(|e| diesel::result::Error::DeserializationError(Box::new(e)))
}

#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::urls)]
pub struct UrlRecord {
    pub id: String,
    pub url: String,
    pub host: String,
    pub created: String,
    pub updated: String,
    pub last_head: Option<String>,
    pub last_get: Option<String>,
    pub status: i32,
    pub content_type: String,
    pub content_sniff: String,
    pub content_length: i64,
    pub file_name: String,
    pub title: String,
    pub headers: String,
    pub hash: String,
}

impl From<&Url> for UrlRecord {
    fn from(u: &Url) -> Self {
        Self {
            id: u.id.clone(),
            url: u.url.clone(),
            host: u.host.clone(),
            created: fmt_datetime(u.created),
            updated: fmt_datetime(u.updated),
            last_head: fmt_datetime_opt(u.last_head),
            last_get: fmt_datetime_opt(u.last_get),
            status: u.status,
            content_type: u.content_type.clone(),
            content_sniff: u.content_sniff.clone(),
            content_length: u.content_length,
            file_name: u.file_name.clone(),
            title: u.title.clone(),
            headers: headers_to_json(&u.headers),
            hash: u.hash.clone(),
        }
    }
}

impl TryFrom<UrlRecord> for Url {
    type Error = diesel::result::Error;

    fn try_from(record: UrlRecord) -> Result<Self, Self::Error> {
        Ok(Url {
            id: record.id,
            url: record.url,
            host: record.host,
            created: parse_datetime(&record.created),
            updated: parse_datetime(&record.updated),
            last_head: parse_datetime_opt(record.last_head),
            last_get: parse_datetime_opt(record.last_get),
            status: record.status,
            content_type: record.content_type,
            content_sniff: record.content_sniff,
            content_length: record.content_length,
            file_name: record.file_name,
            title: record.title,
            headers: headers_from_json(&record.headers)?,
            hash: record.hash,
        })
    }
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = crate::schema::links)]
pub struct LinkRecord {
    pub src: String,
    pub dst: String,
    pub created: String,
    pub updated: String,
}

impl From<&Link> for LinkRecord {
    fn from(l: &Link) -> Self {
        Self {
            src: l.src.clone(),
            dst: l.dst.clone(),
            created: fmt_datetime(l.created),
            updated: fmt_datetime(l.updated),
        }
    }
}

impl From<LinkRecord> for Link {
    fn from(record: LinkRecord) -> Self {
        Link {
            src: record.src,
            dst: record.dst,
            created: parse_datetime(&record.created),
            updated: parse_datetime(&record.updated),
        }
    }
}

#[derive(Debug, Queryable)]
pub struct SnapshotRecord {
    pub id: i32,
    pub url: String,
    pub created: String,
    pub status: i32,
    pub duration_ms: i64,
    pub headers: String,
    pub hash: String,
}

/// Insertable snapshot row; the id is assigned by the store.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::snapshots)]
pub struct NewSnapshotRecord {
    pub url: String,
    pub created: String,
    pub status: i32,
    pub duration_ms: i64,
    pub headers: String,
    pub hash: String,
}

impl From<&Snapshot> for NewSnapshotRecord {
    fn from(s: &Snapshot) -> Self {
        Self {
            url: s.url.clone(),
            created: fmt_datetime(s.created),
            status: s.status,
            duration_ms: s.duration_ms,
            headers: headers_to_json(&s.headers),
            hash: s.hash.clone(),
        }
    }
}

impl TryFrom<SnapshotRecord> for Snapshot {
    type Error = diesel::result::Error;

    fn try_from(record: SnapshotRecord) -> Result<Self, Self::Error> {
        Ok(Snapshot {
            url: record.url,
            created: parse_datetime(&record.created),
            status: record.status,
            duration_ms: record.duration_ms,
            headers: headers_from_json(&record.headers)?,
            hash: record.hash,
        })
    }
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = crate::schema::sources)]
pub struct SourceRecord {
    pub id: String,
    pub url: String,
    pub name: String,
    pub crawl: i32,
    pub stale_hours: Option<i64>,
    pub metadata: String,
    pub created: String,
    pub updated: String,
}

impl From<&Source> for SourceRecord {
    fn from(s: &Source) -> Self {
        Self {
            id: s.id.clone(),
            url: s.url.clone(),
            name: s.name.clone(),
            crawl: i32::from(s.crawl),
            stale_hours: s.stale_hours,
            metadata: serde_json::to_string(&s.metadata).unwrap_or_else(|_| "{}".to_string()),
            created: fmt_datetime(s.created),
            updated: fmt_datetime(s.updated),
        }
    }
}

impl TryFrom<SourceRecord> for Source {
    type Error = diesel::result::Error;

    fn try_from(record: SourceRecord) -> Result<Self, Self::Error> {
        let metadata = serde_json::from_str(&record.metadata)
            .map_err(|e| diesel::result::Error::DeserializationError(Box::new(e)))?;
        Ok(Source {
            id: record.id,
            url: record.url,
            name: record.name,
            crawl: record.crawl != 0,
            stale_hours: record.stale_hours,
            metadata,
            created: parse_datetime(&record.created),
            updated: parse_datetime(&record.updated),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::now_secs;

    #[test]
    fn url_record_round_trip() {
        let mut url = Url::new("http://example.com/a".into(), "example.com".into());
        url.headers = vec![("content-type".into(), "text/html".into())];
        url.hash = "1220ab".into();
        let record = UrlRecord::from(&url);
        let back = Url::try_from(record).unwrap();
        assert_eq!(back.url, url.url);
        assert_eq!(back.headers, url.headers);
        assert_eq!(back.created, url.created);
        assert_eq!(back.hash, "1220ab");
    }

    #[test]
    fn invalid_headers_json_is_an_error() {
        let record = UrlRecord {
            headers: "not json".into(),
            ..UrlRecord::from(&Url::new("http://a/".into(), "a".into()))
        };
        assert!(Url::try_from(record).is_err());
    }

    #[test]
    fn source_record_round_trip() {
        let mut source = Source::new("http://example.com".into(), "Example".into(), true);
        source.stale_hours = Some(24);
        let back = Source::try_from(SourceRecord::from(&source)).unwrap();
        assert!(back.crawl);
        assert_eq!(back.stale_hours, Some(24));
        assert_eq!(back.created, source.created);
    }

    #[test]
    fn snapshot_insert_record_carries_all_fields() {
        let snapshot = Snapshot::new(
            "http://example.com/a".into(),
            now_secs(),
            200,
            42,
            vec![("server".into(), "nginx".into())],
            "1220ff".into(),
        );
        let record = NewSnapshotRecord::from(&snapshot);
        assert_eq!(record.status, 200);
        assert_eq!(record.duration_ms, 42);
        assert!(record.headers.contains("nginx"));
    }
}
