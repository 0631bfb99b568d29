//! Checked-in output of `tonic-prost-build` (see build.rs). Regenerate with
//! `ELCHI_REGEN_PROTO=1 cargo build -p elchi-proto` after editing the proto.

#[allow(clippy::all)]
pub mod elchi;
