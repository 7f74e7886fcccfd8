use urlindex::persist::{decode, encode_at};
use urlindex::{load_cache, save_cache, CacheError, HistoryInfo, UrlIndex};

const NOW: i64 = 1_700_000_000;

fn row(history_id: u64, url: &str, typed_count: u32) -> HistoryInfo {
    HistoryInfo {
        history_id,
        url: url.to_string(),
        title: format!("title {history_id}"),
        visit_count: 3,
        typed_count,
        last_visit: NOW - 3_600,
    }
}

fn populated_index() -> UrlIndex {
    let mut index = UrlIndex::new();
    index.index_row(row(1, "http://example.com/foo", 2));
    index.index_row(row(2, "http://example.org/foo", 0));
    index.index_row(row(3, "http://chromium.org/", 1));
    index.delete_url(2); // leave a stale posting behind
    index
}

#[test]
fn round_trip_preserves_structures_and_results() {
    let index = populated_index();
    let blob = encode_at(&index, NOW).unwrap();
    let mut restored = decode(&blob).unwrap();

    // Identical structures encode to identical bytes.
    assert_eq!(blob, encode_at(&restored, NOW).unwrap());
    assert_eq!(restored.history_item_count(), index.history_item_count());
    assert_eq!(restored.word_count(), index.word_count());
    assert_eq!(restored.word_id("foo"), index.word_id("foo"));

    let mut index = index;
    for query in ["foo", "chrom", "example com"] {
        assert_eq!(
            index.history_items_for_terms_at(query, NOW),
            restored.history_items_for_terms_at(query, NOW)
        );
    }
    // Stale postings stay stale after restore.
    assert!(restored
        .history_items_for_terms_at("foo", NOW)
        .iter()
        .all(|m| m.history_id != 2));
}

#[test]
fn empty_index_is_trivially_valid() {
    let blob = encode_at(&UrlIndex::new(), NOW).unwrap();
    let restored = decode(&blob).unwrap();
    assert_eq!(restored.history_item_count(), 0);
    assert_eq!(restored.word_count(), 0);
}

#[test]
fn save_and_load_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.cache");
    let index = populated_index();
    save_cache(&path, &index).unwrap();
    let restored = load_cache(&path).unwrap();
    assert_eq!(restored.history_item_count(), index.history_item_count());
}

#[test]
fn missing_file_reports_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_cache(&dir.path().join("nope.cache")).unwrap_err();
    assert!(matches!(err, CacheError::Io(_)));
}

#[test]
fn truncated_blob_fails_structurally() {
    let blob = encode_at(&populated_index(), NOW).unwrap();
    let err = decode(&blob[..blob.len() / 2]).unwrap_err();
    assert!(matches!(err, CacheError::Codec(_)));
}

#[test]
fn garbage_fails_structurally() {
    let err = decode(&[0x00, 0x01, 0x02]).unwrap_err();
    assert!(matches!(err, CacheError::Codec(_)));
}

#[test]
fn wrong_magic_is_rejected() {
    let mut blob = encode_at(&populated_index(), NOW).unwrap();
    // magic: u32 little-endian at offset 0
    blob[0] ^= 0xff;
    let err = decode(&blob).unwrap_err();
    assert!(matches!(err, CacheError::BadMagic(_)));
}

#[test]
fn unknown_version_is_rejected() {
    let mut blob = encode_at(&populated_index(), NOW).unwrap();
    // version: u32 little-endian at offset 4
    blob[4] = 0xfe;
    let err = decode(&blob).unwrap_err();
    assert!(matches!(err, CacheError::UnsupportedVersion(_)));
}

#[test]
fn declared_count_mismatch_fails_the_restore() {
    let mut blob = encode_at(&populated_index(), NOW).unwrap();
    // Header is magic(4) + version(4) + saved_at(8) + item count(4); the
    // word-list block's declared count is the u64 right after it.
    let declared = u64::from_le_bytes(blob[20..28].try_into().unwrap());
    blob[20..28].copy_from_slice(&(declared + 1).to_le_bytes());
    let err = decode(&blob).unwrap_err();
    assert!(matches!(
        err,
        CacheError::CountMismatch { block: "word list", .. }
    ));
}
