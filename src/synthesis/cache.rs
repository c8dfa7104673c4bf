//! SQLite cache of synthesized speech fragments.
//!
//! Fragments are keyed by story and segment index and carry a hash of the
//! voice and text they were synthesized from. A lookup only hits when the
//! hash still matches, so editing one paragraph or changing the voice
//! invalidates exactly the affected segments.

use crate::audio::PcmAudio;
use crate::error::{FortellError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS fragments (
    story_id TEXT NOT NULL,
    segment_index INTEGER NOT NULL,
    text_hash TEXT NOT NULL,
    sample_rate INTEGER NOT NULL,
    channels INTEGER NOT NULL,
    pcm BLOB NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (story_id, segment_index)
);
"#;

/// Hash identifying the input a fragment was synthesized from.
pub fn fragment_hash(voice_fingerprint: &str, text: &str) -> String {
    format!("{:x}", md5::compute(format!("{}|{}", voice_fingerprint, text)))
}

/// SQLite-backed fragment cache.
pub struct FragmentCache {
    conn: Mutex<Connection>,
}

impl FragmentCache {
    /// Open (or create) a cache database.
    #[instrument(skip_all)]
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened fragment cache at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FortellError::Cache(format!("Failed to acquire lock: {}", e)))
    }

    /// Cached audio for a segment, if it was synthesized from the same input.
    pub fn get(&self, story_id: &str, index: usize, hash: &str) -> Result<Option<PcmAudio>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT sample_rate, channels, pcm FROM fragments
                 WHERE story_id = ?1 AND segment_index = ?2 AND text_hash = ?3",
                params![story_id, index as i64, hash],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((sample_rate, channels, pcm)) => {
                debug!("Fragment cache hit: {}#{}", story_id, index);
                Ok(Some(PcmAudio::from_le_bytes(&pcm, sample_rate, channels)?))
            }
            None => Ok(None),
        }
    }

    /// Duration of a cached segment without loading its samples.
    pub fn duration(&self, story_id: &str, index: usize, hash: &str) -> Result<Option<f64>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT sample_rate, channels, length(pcm) FROM fragments
                 WHERE story_id = ?1 AND segment_index = ?2 AND text_hash = ?3",
                params![story_id, index as i64, hash],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.and_then(|(rate, channels, bytes)| {
            let frame_bytes = 2 * channels.max(1) as i64;
            (rate > 0).then(|| (bytes / frame_bytes) as f64 / rate as f64)
        }))
    }

    /// Store a fragment, replacing whatever was cached for that segment.
    pub fn put(&self, story_id: &str, index: usize, hash: &str, audio: &PcmAudio) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO fragments
                (story_id, segment_index, text_hash, sample_rate, channels, pcm, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                story_id,
                index as i64,
                hash,
                audio.sample_rate,
                audio.channels,
                audio.to_le_bytes(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Number of cached fragments.
    pub fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM fragments", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
