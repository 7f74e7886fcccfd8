use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::index::{HistoryId, HistoryInfo, UrlIndex, WordId};

const CACHE_MAGIC: u32 = 0x5552_4c58; // "URLX"
const CACHE_VERSION: u32 = 1;

/// Why a cache blob could not be written or restored. Every variant is
/// recoverable: the caller falls back to a full rebuild from the history
/// store and the in-memory index keeps serving queries either way.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache codec: {0}")]
    Codec(#[from] bincode::Error),
    #[error("bad cache magic {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported cache version {0}")]
    UnsupportedVersion(u32),
    #[error("{block} block declared {declared} items but decoded {actual}")]
    CountMismatch {
        block: &'static str,
        declared: u64,
        actual: u64,
    },
    #[error("word table holds {list} words but the word map holds {map}")]
    WordTableSkew { list: u64, map: u64 },
}

/// A length-validated section of the cache blob. The declared count is
/// written at save time and compared against the number of entries that
/// actually decode; a mismatch fails the whole restore.
#[derive(Serialize, Deserialize)]
struct Block<T> {
    declared: u64,
    items: Vec<T>,
}

impl<T> Block<T> {
    fn new(items: Vec<T>) -> Self {
        Self {
            declared: items.len() as u64,
            items,
        }
    }

    fn validate(self, block: &'static str) -> Result<Vec<T>, CacheError> {
        if self.declared != self.items.len() as u64 {
            return Err(CacheError::CountMismatch {
                block,
                declared: self.declared,
                actual: self.items.len() as u64,
            });
        }
        Ok(self.items)
    }
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    magic: u32,
    version: u32,
    saved_at: i64,
    history_item_count: u32,
    word_list: Block<String>,
    word_map: Block<(String, WordId)>,
    char_word_map: Block<(char, BTreeSet<WordId>)>,
    word_history_map: Block<(WordId, BTreeSet<HistoryId>)>,
    history_info: Block<HistoryInfo>,
}

/// Serialize a point-in-time snapshot of the index, stamped with the
/// current time.
pub fn encode(index: &UrlIndex) -> Result<Vec<u8>, CacheError> {
    encode_at(index, crate::unix_now())
}

/// As [`encode`], with an explicit save timestamp. Map blocks are written in
/// sorted key order, so identical indexes encode to identical blobs.
pub fn encode_at(index: &UrlIndex, saved_at: i64) -> Result<Vec<u8>, CacheError> {
    let mut word_map: Vec<(String, WordId)> = index
        .word_map
        .iter()
        .map(|(word, &id)| (word.clone(), id))
        .collect();
    word_map.sort_by_key(|&(_, id)| id);

    let mut char_word_map: Vec<(char, BTreeSet<WordId>)> = index
        .char_word_map
        .iter()
        .map(|(&ch, ids)| (ch, ids.clone()))
        .collect();
    char_word_map.sort_by_key(|&(ch, _)| ch);

    let mut word_history_map: Vec<(WordId, BTreeSet<HistoryId>)> = index
        .word_history_map
        .iter()
        .map(|(&id, ids)| (id, ids.clone()))
        .collect();
    word_history_map.sort_by_key(|&(id, _)| id);

    let mut history_info: Vec<HistoryInfo> = index.history_info_map.values().cloned().collect();
    history_info.sort_by_key(|row| row.history_id);

    let file = CacheFile {
        magic: CACHE_MAGIC,
        version: CACHE_VERSION,
        saved_at,
        history_item_count: index.history_item_count,
        word_list: Block::new(index.word_list.clone()),
        word_map: Block::new(word_map),
        char_word_map: Block::new(char_word_map),
        word_history_map: Block::new(word_history_map),
        history_info: Block::new(history_info),
    };
    Ok(bincode::serialize(&file)?)
}

/// Rebuild an index from a cache blob. There is no partial restore: any
/// structural failure or count mismatch rejects the blob and the caller
/// must rebuild from the authoritative history store. A zero-entry blob
/// restores to an empty index.
pub fn decode(blob: &[u8]) -> Result<UrlIndex, CacheError> {
    let file: CacheFile = bincode::deserialize(blob)?;
    if file.magic != CACHE_MAGIC {
        return Err(CacheError::BadMagic(file.magic));
    }
    if file.version != CACHE_VERSION {
        return Err(CacheError::UnsupportedVersion(file.version));
    }

    let word_list = file.word_list.validate("word list")?;
    let word_map_entries = file.word_map.validate("word map")?;
    let char_word_entries = file.char_word_map.validate("char posting")?;
    let word_history_entries = file.word_history_map.validate("word posting")?;
    let history_info = file.history_info.validate("history info")?;

    if word_list.len() != word_map_entries.len() {
        return Err(CacheError::WordTableSkew {
            list: word_list.len() as u64,
            map: word_map_entries.len() as u64,
        });
    }
    if file.history_item_count as u64 != history_info.len() as u64 {
        return Err(CacheError::CountMismatch {
            block: "history info",
            declared: file.history_item_count as u64,
            actual: history_info.len() as u64,
        });
    }

    let mut index = UrlIndex::new();
    index.word_list = word_list;
    index.word_map = word_map_entries.into_iter().collect();
    index.char_word_map = char_word_entries.into_iter().collect();
    index.word_history_map = word_history_entries.into_iter().collect();
    index.history_info_map = history_info
        .into_iter()
        .map(|row| (row.history_id, row))
        .collect::<HashMap<_, _>>();
    index.history_item_count = file.history_item_count;
    Ok(index)
}

/// Write the cache blob for `index` at `path`.
pub fn save_cache(path: &Path, index: &UrlIndex) -> Result<(), CacheError> {
    let blob = encode(index)?;
    fs::write(path, &blob)?;
    tracing::info!(
        path = %path.display(),
        bytes = blob.len(),
        items = index.history_item_count(),
        "saved url index cache"
    );
    Ok(())
}

/// Read and restore the cache blob at `path`.
pub fn load_cache(path: &Path) -> Result<UrlIndex, CacheError> {
    let blob = fs::read(path)?;
    let index = decode(&blob)?;
    tracing::info!(
        path = %path.display(),
        items = index.history_item_count(),
        words = index.word_count(),
        "restored url index cache"
    );
    Ok(index)
}
