//! Property tests for engine round-trips and merge determinism.
