//! Hash-bucketed key layout shared by every generated switch
//!
//! Keys are grouped by `hash & mask`, where the table size is the next power
//! of two at or above the key count. Keys whose full hashes collide are
//! flagged so the guard also compares the name.
//!
//! Method and class names fold ASCII case only; bytes above 0x7f are kept as
//! they are, matching how the hierarchy stores names. Property and constant
//! names are compared exactly.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::hash::NameHasher;
use crate::writer::CodeWriter;

/// One key placed in a [`JumpTable`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpEntry {
    /// Key as given (display form)
    pub name: String,
    /// Comparison key: ASCII lower-cased, or the name itself for exact tables
    pub lname: String,
    /// Full hash of the key
    pub hash: u64,
    /// `hash & mask`
    pub bucket: u64,
    /// Another key has the same full hash
    pub tie_break: bool,
}

/// How keys of a table are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCase {
    /// ASCII case is ignored (methods, classes)
    Insensitive,
    /// Byte-exact (static properties, constants)
    Sensitive,
}

impl KeyCase {
    /// Comparison key of `name`
    pub fn fold(self, name: &str) -> String {
        match self {
            KeyCase::Insensitive => name.to_ascii_lowercase(),
            KeyCase::Sensitive => name.to_string(),
        }
    }
}

/// Ordered bucket layout for a set of keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTable {
    entries: Vec<JumpEntry>,
    mask: u64,
    case: KeyCase,
}

impl JumpTable {
    /// Lay out `keys` ignoring ASCII case; duplicates keep their first spelling
    pub fn new<I, S>(keys: I, hasher: NameHasher) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_case(keys, hasher, KeyCase::Insensitive)
    }

    /// Lay out `keys` compared byte for byte
    pub fn case_sensitive<I, S>(keys: I, hasher: NameHasher) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_case(keys, hasher, KeyCase::Sensitive)
    }

    /// Lay out `keys` under the given comparison
    pub fn with_case<I, S>(keys: I, hasher: NameHasher, case: KeyCase) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = FxHashSet::default();
        let mut entries: Vec<JumpEntry> = Vec::new();
        for key in keys {
            let name = key.into();
            let lname = case.fold(&name);
            if !seen.insert(lname.clone()) {
                continue;
            }
            entries.push(JumpEntry {
                hash: hasher(&lname),
                name,
                lname,
                bucket: 0,
                tie_break: false,
            });
        }

        let mask = (entries.len().next_power_of_two() as u64) - 1;

        let mut per_hash: FxHashMap<u64, usize> = FxHashMap::default();
        for entry in &entries {
            *per_hash.entry(entry.hash).or_insert(0) += 1;
        }
        for entry in &mut entries {
            entry.bucket = entry.hash & mask;
            entry.tie_break = per_hash[&entry.hash] > 1;
        }

        entries.sort_by(|a, b| a.bucket.cmp(&b.bucket).then_with(|| a.lname.cmp(&b.lname)));

        Self { entries, mask, case }
    }

    /// Key comparison used by this table
    pub fn case(&self) -> KeyCase {
        self.case
    }

    /// Comparison key the table would derive from `name`
    pub fn key(&self, name: &str) -> String {
        self.case.fold(name)
    }

    /// Entries ordered by bucket, then name
    pub fn entries(&self) -> &[JumpEntry] {
        &self.entries
    }

    /// Bucket mask (`size - 1`)
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sharing one bucket, in table order
    pub fn buckets(&self) -> Vec<(u64, &[JumpEntry])> {
        let mut groups = Vec::new();
        let mut start = 0;
        while start < self.entries.len() {
            let bucket = self.entries[start].bucket;
            let end = self.entries[start..]
                .iter()
                .position(|e| e.bucket != bucket)
                .map_or(self.entries.len(), |offset| start + offset);
            groups.push((bucket, &self.entries[start..end]));
            start = end;
        }
        groups
    }

    /// Entry the generated code would select for `name`.
    ///
    /// Guards without a tie-break compare only the hash, exactly as the
    /// emitted `HASH_GUARD` does.
    pub fn find(&self, name: &str, hasher: NameHasher) -> Option<&JumpEntry> {
        let lname = self.case.fold(name);
        let hash = hasher(&lname);
        let bucket = hash & self.mask;
        self.entries
            .iter()
            .filter(|e| e.bucket == bucket && e.hash == hash)
            .find(|e| !e.tie_break || e.lname == lname)
    }
}

/// Write `switch (selector & mask)` with one `case` per occupied bucket.
///
/// Nothing is written for an empty table.
pub fn render_switch<F>(w: &mut CodeWriter, selector: &str, table: &JumpTable, mut emit: F)
where
    F: FnMut(&mut CodeWriter, &JumpEntry),
{
    if table.is_empty() {
        return;
    }
    w.indent_begin(format!("switch ({} & {}) {{", selector, table.mask()));
    for (bucket, group) in table.buckets() {
        w.indent_begin(format!("case {}:", bucket));
        for entry in group {
            emit(w, entry);
        }
        w.line("break;");
        w.indent_end("");
    }
    w.indent_end("}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{hash_name, hash_name_i};

    fn colliding(name: &str) -> u64 {
        match name {
            "alpha" | "beta" => 42,
            other => hash_name_i(other),
        }
    }

    #[test]
    fn test_mask_is_power_of_two_minus_one() {
        assert_eq!(JumpTable::new(Vec::<String>::new(), hash_name_i).mask(), 0);
        assert_eq!(JumpTable::new(["a"], hash_name_i).mask(), 0);
        assert_eq!(JumpTable::new(["a", "b", "c"], hash_name_i).mask(), 3);
        assert_eq!(JumpTable::new(["a", "b", "c", "d", "e"], hash_name_i).mask(), 7);
    }

    #[test]
    fn test_order_and_dedup() {
        let table = JumpTable::new(["Foo", "bar", "foo", "baz"], hash_name_i);
        assert_eq!(table.len(), 3);
        assert!(table.entries().iter().any(|e| e.name == "Foo"));
        for pair in table.entries().windows(2) {
            assert!((pair[0].bucket, &pair[0].lname) <= (pair[1].bucket, &pair[1].lname));
        }
        let total: usize = table.buckets().iter().map(|(_, group)| group.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_tie_break_on_full_collision() {
        let table = JumpTable::new(["alpha", "beta", "gamma"], colliding);
        let flagged: Vec<&str> = table
            .entries()
            .iter()
            .filter(|e| e.tie_break)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(flagged, vec!["alpha", "beta"]);

        assert_eq!(table.find("BETA", colliding).map(|e| e.name.as_str()), Some("beta"));
        assert_eq!(table.find("alpha", colliding).map(|e| e.name.as_str()), Some("alpha"));
        assert!(table.find("delta", colliding).is_none());
    }

    #[test]
    fn test_render_switch_groups_buckets() {
        fn fixed(name: &str) -> u64 {
            match name {
                "a" => 0,
                "b" => 4,
                _ => 1,
            }
        }
        let table = JumpTable::new(["a", "b", "c"], fixed);
        let mut w = CodeWriter::new();
        render_switch(&mut w, "hash", &table, |w, e| w.line(format!("HIT({});", e.lname)));
        assert_eq!(
            w.finish(),
            "switch (hash & 3) {\n  case 0:\n    HIT(a);\n    HIT(b);\n    break;\n  case 1:\n    HIT(c);\n    break;\n}\n"
        );

        let mut w = CodeWriter::new();
        render_switch(&mut w, "hash", &JumpTable::new(Vec::<String>::new(), fixed), |_, _| {});
        assert!(w.finish().is_empty());
    }

    #[test]
    fn test_non_ascii_bytes_are_not_folded() {
        let table = JumpTable::new(["Ärger", "ärger", "ÄRGER"], hash_name_i);
        // Only the ASCII letters fold, so the first two keys stay distinct
        assert_eq!(table.len(), 2);
        assert_eq!(table.find("äRGER", hash_name_i).map(|e| e.name.as_str()), Some("ärger"));
        assert!(table.entries().iter().any(|e| e.lname == "Ärger"));
    }

    #[test]
    fn test_case_sensitive_keys() {
        let table = JumpTable::case_sensitive(["count", "Count", "count"], hash_name);
        assert_eq!(table.len(), 2);
        assert_eq!(table.case(), KeyCase::Sensitive);
        assert_eq!(table.find("Count", hash_name).map(|e| e.name.as_str()), Some("Count"));
        assert_eq!(table.find("count", hash_name).map(|e| e.name.as_str()), Some("count"));
        assert!(table.find("COUNT", hash_name).is_none());
    }

    #[test]
    fn test_find_matches_by_hash_alone_without_tie_break() {
        fn constant(_: &str) -> u64 {
            7
        }
        let table = JumpTable::new(["only"], constant);
        // A different name with the same hash hits the unguarded branch
        assert_eq!(table.find("other", constant).map(|e| e.name.as_str()), Some("only"));
    }
}
