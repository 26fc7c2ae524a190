//! End-to-end tests of the write/read/delete/compact paths with real AEAD
//! encryption over the in-memory blob store.
