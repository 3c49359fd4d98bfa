//! Feature ids to named capability families.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::disassembler::FeatureCatalog;

use super::ScanResult;

/// Label prefixes (uppercased) and the capability family they belong to.
/// First match wins, so longer prefixes come first.
static CAPABILITY_PREFIXES: &[(&str, &str)] = &[
    // x86 (iced CpuidFeature names)
    ("AVX512", "AVX-512"),
    ("AVX_VNNI", "AVX-VNNI"),
    ("AVX_IFMA", "AVX-IFMA"),
    ("AVX2", "AVX2"),
    ("AVX", "AVX"),
    ("FMA", "FMA"),
    ("F16C", "F16C"),
    ("SSE4_1", "SSE4.1"),
    ("SSE4_2", "SSE4.2"),
    ("SSE4A", "SSE4a"),
    ("SSSE3", "SSSE3"),
    ("SSE3", "SSE3"),
    ("SSE2", "SSE2"),
    ("SSE", "SSE"),
    ("MMX", "MMX"),
    ("D3NOW", "3DNow!"),
    ("AES", "AES-NI"),
    ("VAES", "AES-NI"),
    ("PCLMULQDQ", "CLMUL"),
    ("VPCLMULQDQ", "CLMUL"),
    ("SHA", "SHA"),
    ("BMI", "BMI"),
    ("ADX", "ADX"),
    ("POPCNT", "POPCNT"),
    ("LZCNT", "LZCNT"),
    ("AMX", "AMX"),
    ("GFNI", "GFNI"),
    ("RTM", "TSX"),
    ("HLE", "TSX"),
    ("FPU", "x87"),
    ("INTEL", "base"),
    ("X64", "base"),
    ("CMOV", "base"),
    ("CX8", "base"),
    ("CPUID", "base"),
    // AArch64 (capstone group names)
    ("NEON", "NEON"),
    ("FPARMV8", "FP"),
    ("CRYPTO", "Crypto"),
    ("CRC", "CRC32"),
    ("SVE", "SVE"),
    ("SME", "SME"),
    ("LSE", "LSE"),
];

/// One backend feature label and how often it was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureUsage {
    pub label: String,
    pub count: u64,
}

/// Feature counts rolled up into one capability family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityUsage {
    pub capability: String,
    /// Sum of the member feature counts.
    pub count: u64,
    pub features: Vec<FeatureUsage>,
}

/// Capability family of a backend feature label. Unknown labels map to themselves.
pub fn capability_for(label: &str) -> String {
    let upper = label.to_ascii_uppercase();
    // capstone 5 spells AArch64 groups as predicates, e.g. "HasNEON".
    let key = upper.strip_prefix("HAS").unwrap_or(&upper);
    CAPABILITY_PREFIXES
        .iter()
        .find(|(prefix, _)| key.starts_with(prefix))
        .map(|(_, capability)| (*capability).to_string())
        .unwrap_or_else(|| label.to_string())
}

/// Label every feature in `result` and group the counts by capability.
///
/// Sorted by capability, then label. Ids the catalog cannot name are kept
/// under their numeric form (`#n`).
pub fn aggregate(result: &ScanResult, catalog: &dyn FeatureCatalog) -> Vec<CapabilityUsage> {
    let mut families: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    for (&id, &count) in &result.feature_counts {
        let label = catalog.feature_label(id).unwrap_or_else(|| id.to_string());
        *families
            .entry(capability_for(&label))
            .or_default()
            .entry(label)
            .or_insert(0) += count;
    }

    families
        .into_iter()
        .map(|(capability, labels)| CapabilityUsage {
            capability,
            count: labels.values().sum(),
            features: labels
                .into_iter()
                .map(|(label, count)| FeatureUsage { label, count })
                .collect(),
        })
        .collect()
}
