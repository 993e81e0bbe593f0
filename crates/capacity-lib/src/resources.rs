//! Resource vector arithmetic
//!
//! A `ResourceVector` bundles the capacity dimensions tracked for a machine,
//! a node, or a pod. All operations are pure and return a new vector.
//! Arithmetic saturates at the `i64` bounds instead of overflowing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Capacity along every tracked dimension
///
/// Memory and disk are expressed in MiB, network bandwidth in MBPS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceVector {
    #[serde(default)]
    pub cpu: i64,
    #[serde(default)]
    pub gpu: i64,
    #[serde(default, rename = "memoryMB")]
    pub memory_mb: i64,
    #[serde(default, rename = "diskMB")]
    pub disk_mb: i64,
    #[serde(default, rename = "networkMBPS")]
    pub network_mbps: i64,
}

impl ResourceVector {
    pub const ZERO: ResourceVector = ResourceVector {
        cpu: 0,
        gpu: 0,
        memory_mb: 0,
        disk_mb: 0,
        network_mbps: 0,
    };

    pub fn new(cpu: i64, gpu: i64, memory_mb: i64, disk_mb: i64, network_mbps: i64) -> Self {
        Self {
            cpu,
            gpu,
            memory_mb,
            disk_mb,
            network_mbps,
        }
    }

    fn fields(&self) -> [i64; 5] {
        [
            self.cpu,
            self.gpu,
            self.memory_mb,
            self.disk_mb,
            self.network_mbps,
        ]
    }

    fn from_fields(fields: [i64; 5]) -> Self {
        let [cpu, gpu, memory_mb, disk_mb, network_mbps] = fields;
        Self::new(cpu, gpu, memory_mb, disk_mb, network_mbps)
    }

    fn zip_with(&self, other: &Self, f: impl Fn(i64, i64) -> i64) -> Self {
        let a = self.fields();
        let b = other.fields();
        Self::from_fields(std::array::from_fn(|i| f(a[i], b[i])))
    }

    fn map(&self, f: impl Fn(i64) -> i64) -> Self {
        Self::from_fields(self.fields().map(f))
    }

    /// Per-dimension difference, never going below `floor`
    pub fn sub_with_floor(&self, other: &Self, floor: i64) -> Self {
        self.zip_with(other, |a, b| a.saturating_sub(b).max(floor))
    }

    /// Scale every dimension by `n`
    pub fn multiply(&self, n: i64) -> Self {
        self.map(|v| v.saturating_mul(n))
    }

    /// Integer-divide every dimension by `n`, e.g. a quarter of a machine.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    pub fn divide(&self, n: i64) -> Self {
        self.map(|v| v / n)
    }

    /// Smallest `k` such that `unit * k` covers `self` in every dimension.
    ///
    /// Each dimension is rounded up independently before taking the maximum.
    /// Dimensions where `unit` is zero (or negative) cannot be satisfied by
    /// scaling and are skipped.
    pub fn split_by_with_ceil(&self, unit: &Self) -> i64 {
        self.fields()
            .into_iter()
            .zip(unit.fields())
            .filter(|(_, u)| *u > 0)
            .map(|(total, u)| {
                if total <= 0 {
                    0
                } else {
                    total / u + i64::from(total % u != 0)
                }
            })
            .max()
            .unwrap_or(0)
    }

    /// True if every dimension of `self` is at least the one in `other`
    pub fn dominates(&self, other: &Self) -> bool {
        self.fields()
            .into_iter()
            .zip(other.fields())
            .all(|(a, b)| a >= b)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl Add for ResourceVector {
    type Output = ResourceVector;

    fn add(self, rhs: Self) -> Self::Output {
        self.zip_with(&rhs, i64::saturating_add)
    }
}

impl std::iter::Sum for ResourceVector {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(ResourceVector::ZERO, |acc, v| acc + v)
    }
}

impl fmt::Display for ResourceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cpu={} gpu={} memoryMB={} diskMB={} networkMBPS={}",
            self.cpu, self.gpu, self.memory_mb, self.disk_mb, self.network_mbps
        )
    }
}
