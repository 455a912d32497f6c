use streamguard_core::CheckRegistry;

struct KindDoc {
    kind: &'static str,
    summary: &'static str,
    params: &'static str,
}

const KINDS: &[KindDoc] = &[
    KindDoc {
        kind: "not_null",
        summary: "Counts null values in a column",
        params: "column",
    },
    KindDoc {
        kind: "unique",
        summary: "Exact duplicate detection, spills keys to disk past the memory limit. \
                  Rows with a null key are skipped",
        params: "column | columns, memory_limit, prefilter, expected_keys, \
                 false_positive_rate, spill_dir",
    },
    KindDoc {
        kind: "pattern",
        summary: "Values must fully match a regular expression. Nulls are skipped",
        params: "column, pattern",
    },
    KindDoc {
        kind: "allowed_values",
        summary: "Values must belong to a reference set. Nulls are skipped",
        params: "column, values",
    },
    KindDoc {
        kind: "range",
        summary: "Numeric values within [min, max]. Non numeric values fail",
        params: "column, min, max",
    },
    KindDoc {
        kind: "zscore",
        summary: "Two passes: mean and standard deviation, then |z| > threshold fails",
        params: "column, threshold (3.0)",
    },
    KindDoc {
        kind: "iqr",
        summary: "Values outside [Q1 - k*IQR, Q3 + k*IQR] fail. Quartiles are \
                  estimated past max_values",
        params: "column, multiplier (1.5), max_values (100000), seed",
    },
];

/// Reference text for every kind the registry knows.
pub fn checks_documentation(registry: &CheckRegistry) -> String {
    let mut out = String::from("Available check kinds\n");
    out.push_str("Shared params: max_failure_samples (10)\n");
    out.push_str("Per check: id, kind, mode = full | sampled, sample_size, seed, tolerance\n\n");
    for kind in registry.kinds() {
        match KINDS.iter().find(|doc| doc.kind == kind) {
            Some(doc) => {
                out.push_str(&format!("{}\n  {}\n  params: {}\n", doc.kind, doc.summary, doc.params));
            }
            None => out.push_str(&format!("{kind}\n  custom check\n")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_documented() {
        let registry = CheckRegistry::with_builtin();
        let doc = checks_documentation(&registry);
        for kind in registry.kinds() {
            assert!(KINDS.iter().any(|d| d.kind == kind), "{kind} undocumented");
            assert!(doc.contains(kind));
        }
        assert!(!doc.contains("custom check"));
    }
}
