use std::{collections::BTreeMap, sync::Arc};

use base64ct::{Base64, Encoding};
use jobvault::{
    backend::{InMemory, KvBackend},
    store::{NONCE_LENGTH, Partition, RecordStore, blob_key},
};

use crate::helpers::*;

#[tokio::test]
async fn test_round_trip_with_distinct_nonces() {
    let backend = Arc::new(InMemory::new());
    let blobs = blob_store(backend.clone());
    let value: BTreeMap<String, Vec<u32>> =
        [("a".to_string(), vec![1, 2, 3]), ("b".to_string(), vec![])].into();

    blobs.put("k1", &value).await.unwrap();
    let first = backend.get("k1").await.unwrap().unwrap();
    blobs.put("k1", &value).await.unwrap();
    let second = backend.get("k1").await.unwrap().unwrap();

    assert_ne!(first, second, "same plaintext must not produce the same blob");
    let a = Base64::decode_vec(&first).unwrap();
    let b = Base64::decode_vec(&second).unwrap();
    assert_ne!(a[..NONCE_LENGTH], b[..NONCE_LENGTH]);

    let read: BTreeMap<String, Vec<u32>> = blobs.get("k1").await.unwrap().unwrap();
    assert_eq!(read, value);
}

#[tokio::test]
async fn test_absent_key_reads_as_none() {
    let blobs = blob_store(Arc::new(InMemory::new()));
    let read: Option<String> = blobs.get("missing").await.unwrap();
    assert!(read.is_none());
}

#[tokio::test]
async fn test_flipping_any_byte_is_detected() {
    let backend = Arc::new(InMemory::new());
    let blobs = blob_store(backend.clone());
    blobs.put("k", &"confidential").await.unwrap();
    let sealed = Base64::decode_vec(&backend.get("k").await.unwrap().unwrap()).unwrap();

    for i in 0..sealed.len() {
        let mut tampered = sealed.clone();
        tampered[i] ^= 0x01;
        backend
            .put("k", Base64::encode_string(&tampered))
            .await
            .unwrap();
        let err = blobs.get::<String>("k").await.unwrap_err();
        assert!(err.is_decryption_error(), "byte {i}: {err}");
    }
}

#[tokio::test]
async fn test_garbage_blob_is_decryption_error() {
    let backend = Arc::new(InMemory::new());
    let blobs = blob_store(backend.clone());
    backend.put("k", "not base64 at all!".to_string()).await.unwrap();
    assert!(blobs.get::<String>("k").await.unwrap_err().is_decryption_error());
}

#[tokio::test]
async fn test_schema_mismatch_is_corrupted_not_decryption() {
    let backend = Arc::new(InMemory::new());
    let blobs = blob_store(backend.clone());
    let key = blob_key(Partition::Active, USER);
    // Authenticates fine, but is not a record mapping.
    blobs.put(&key, &vec!["not", "records"]).await.unwrap();

    let store = RecordStore::new(blobs, USER, Partition::Active, clock());
    let err = store.list().await.unwrap_err();
    assert!(err.is_corrupted());
    assert!(!err.is_decryption_error());
    assert!(!err.is_not_found());
}
