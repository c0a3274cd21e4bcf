//! Telemetry value validation
//!
//! Range-checks raw readings against the physical bounds of their kind so
//! corrupt or out-of-range sensor driver output never reaches the wire.
//! Stateless; the per-kind bounds live on [`SensorKind`].

use crate::feed::SensorKind;

/// True if `value` is a finite reading inside the physical range of `kind`.
///
/// NaN and infinities are rejected unconditionally; kinds without a defined
/// range (`Other`) never validate.
pub fn is_valid(kind: SensorKind, value: f32) -> bool {
    if !value.is_finite() {
        return false;
    }
    match kind.valid_range() {
        Some((lo, hi)) => value >= lo && value <= hi,
        None => false,
    }
}
