use std::collections::BTreeMap;

use indexmap::IndexSet;
use rustc_hash::FxHashSet;
use serde::Serialize;
use swc_common::{Span, DUMMY_SP};
use tl_ast::{ModuleSlot, ScopeId, ScopeTree, VariableKind, DEFAULT_LOCAL_NAME};

/// A `(source, laziness)` pair the module asks to be linked against.
///
/// A lazy and an eager import of the same source are distinct requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModuleRequest {
    pub source: String,
    pub is_lazy: bool,
}

/// A single binding brought in from a module request.
///
/// Named imports (defaults included) carry an `import_name`; namespace
/// imports do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportEntry {
    pub request_index: usize,
    pub local_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_name: Option<String>,
    #[serde(skip)]
    pub local_site: Span,
    #[serde(skip)]
    pub import_site: Span,
}

impl ImportEntry {
    pub fn named(
        request_index: usize,
        local_name: impl Into<String>,
        import_name: impl Into<String>,
        local_site: Span,
        import_site: Span,
    ) -> Self {
        Self {
            request_index,
            local_name: local_name.into(),
            import_name: Some(import_name.into()),
            local_site,
            import_site,
        }
    }

    pub fn namespace(request_index: usize, local_name: impl Into<String>, site: Span) -> Self {
        Self {
            request_index,
            local_name: local_name.into(),
            import_name: None,
            local_site: site,
            import_site: site,
        }
    }
}

/// A single name this module exposes: local, indirect or star.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_name: Option<String>,
    pub is_constant: bool,
    #[serde(skip)]
    pub export_site: Span,
    #[serde(skip)]
    pub local_site: Span,
}

impl ExportEntry {
    pub fn local(export_name: impl Into<String>, local_name: impl Into<String>, export_site: Span, local_site: Span) -> Self {
        Self {
            request_index: None,
            export_name: Some(export_name.into()),
            local_name: Some(local_name.into()),
            import_name: None,
            is_constant: false,
            export_site,
            local_site,
        }
    }

    pub fn indirect(
        request_index: usize,
        export_name: impl Into<String>,
        import_name: impl Into<String>,
        export_site: Span,
    ) -> Self {
        Self {
            request_index: Some(request_index),
            export_name: Some(export_name.into()),
            local_name: None,
            import_name: Some(import_name.into()),
            is_constant: false,
            export_site,
            local_site: DUMMY_SP,
        }
    }

    pub fn star(request_index: usize, site: Span) -> Self {
        Self {
            request_index: Some(request_index),
            export_name: None,
            local_name: None,
            import_name: None,
            is_constant: false,
            export_site: site,
            local_site: DUMMY_SP,
        }
    }

    /// Turn a local export into a re-export of `import`'s binding.
    fn promote_to_indirect(&mut self, import: &ImportEntry) {
        debug_assert!(import.import_name.is_some());
        self.import_name = import.import_name.clone();
        self.request_index = Some(import.request_index);
        self.local_name = None;
    }
}

/// Scope-lookup capability used by slot assignment.
pub trait ModuleScope {
    /// Kind of the module-scope value binding `name`, if declared.
    fn find_local(&self, name: &str) -> Option<VariableKind>;
    fn assign_slot(&mut self, name: &str, slot: ModuleSlot);
}

/// [`ModuleScope`] over one scope of a [`ScopeTree`].
pub struct ScopeView<'t> {
    tree: &'t mut ScopeTree,
    scope: ScopeId,
}

impl<'t> ScopeView<'t> {
    pub fn new(tree: &'t mut ScopeTree, scope: ScopeId) -> Self {
        Self { tree, scope }
    }

    pub fn module(tree: &'t mut ScopeTree) -> Self {
        let scope = tree.root();
        Self { tree, scope }
    }
}

impl ModuleScope for ScopeView<'_> {
    fn find_local(&self, name: &str) -> Option<VariableKind> {
        self.tree.find_local(self.scope, name).map(|v| v.kind)
    }

    fn assign_slot(&mut self, name: &str, slot: ModuleSlot) {
        if let Some(variable) = self.tree.find_local_mut(self.scope, name) {
            variable.slot = Some(slot);
        }
    }
}

/// Slots handed out by [`ModuleRecord::assign_module_variable_slots`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleSlots {
    pub exports: BTreeMap<String, u32>,
    pub imports: BTreeMap<String, u32>,
}

/// Per-module table of module requests, imports and exports.
///
/// An export name is unique across local and indirect exports at all
/// times; adds that would break this are rejected and leave the record
/// unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleRecord {
    requests: IndexSet<ModuleRequest>,
    has_lazy_import: bool,
    regular_imports: BTreeMap<String, ImportEntry>,
    namespace_imports: Vec<ImportEntry>,
    local_exports: BTreeMap<String, Vec<ExportEntry>>,
    indirect_exports: Vec<ExportEntry>,
    star_exports: Vec<ExportEntry>,
    #[serde(skip)]
    export_names: FxHashSet<String>,
}

impl ModuleRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the `(source, is_lazy)` request, appending it if new.
    pub fn add_module_request(&mut self, source: impl Into<String>, is_lazy: bool) -> usize {
        let (index, inserted) = self.requests.insert_full(ModuleRequest {
            source: source.into(),
            is_lazy,
        });
        if inserted {
            self.has_lazy_import |= is_lazy;
            tracing::trace!(index, is_lazy, "new module request");
        }
        index
    }

    /// Add a named import.
    ///
    /// A local name that is already imported keeps its first entry. Local
    /// exports already recorded under the same name are promoted to
    /// indirect exports of this import.
    pub fn add_import_entry(&mut self, entry: ImportEntry) {
        debug_assert!(entry.import_name.as_deref().is_some_and(|n| !n.is_empty()));
        debug_assert!(!entry.local_name.is_empty());
        debug_assert!(self.is_valid_request(entry.request_index));

        if let Some(promoted) = self.local_exports.remove(&entry.local_name) {
            tracing::debug!(
                local = entry.local_name.as_str(),
                count = promoted.len(),
                "promoting local exports to indirect"
            );
            for mut export in promoted {
                export.promote_to_indirect(&entry);
                self.indirect_exports.push(export);
            }
        }

        self.regular_imports
            .entry(entry.local_name.clone())
            .or_insert(entry);
    }

    /// Add a namespace import (`import * as x from "m"`).
    pub fn add_star_import_entry(&mut self, entry: ImportEntry) {
        debug_assert!(entry.import_name.is_none());
        debug_assert!(!entry.local_name.is_empty());
        debug_assert!(self.is_valid_request(entry.request_index));
        self.namespace_imports.push(entry);
    }

    /// Add a local export. Returns `false` when the export name is taken.
    ///
    /// A local name that is a regular import makes this a re-export of
    /// that import, added through [`Self::add_indirect_export_entry`].
    pub fn add_local_export_entry(&mut self, mut entry: ExportEntry) -> bool {
        debug_assert!(entry.import_name.is_none());
        debug_assert!(entry.request_index.is_none());
        debug_assert!(entry.export_name.as_deref().is_some_and(|n| !n.is_empty()));
        debug_assert!(entry.local_name.as_deref().is_some_and(|n| !n.is_empty()));
        let Some(local_name) = entry.local_name.clone() else {
            return false;
        };

        if let Some(import) = self.regular_imports.get(&local_name) {
            entry.promote_to_indirect(import);
            return self.add_indirect_export_entry(entry);
        }

        if !self.claim_export_name(&entry) {
            return false;
        }
        self.local_exports.entry(local_name).or_default().push(entry);
        true
    }

    /// Add a re-export. Returns `false` when the export name is taken.
    pub fn add_indirect_export_entry(&mut self, entry: ExportEntry) -> bool {
        debug_assert!(entry.import_name.as_deref().is_some_and(|n| !n.is_empty()));
        debug_assert!(entry.local_name.is_none());
        debug_assert!(entry.request_index.is_some_and(|i| self.is_valid_request(i)));

        if !self.claim_export_name(&entry) {
            return false;
        }
        self.indirect_exports.push(entry);
        true
    }

    /// Add `export * from "m"`. Never rejected here.
    pub fn add_star_export_entry(&mut self, entry: ExportEntry) {
        debug_assert!(entry.import_name.is_none());
        debug_assert!(entry.local_name.is_none());
        debug_assert!(entry.export_name.is_none());
        debug_assert!(entry.request_index.is_some_and(|i| self.is_valid_request(i)));
        self.star_exports.push(entry);
    }

    /// Drop every local export of the reserved default local.
    pub fn remove_default_local_export_entry(&mut self) {
        if let Some(removed) = self.local_exports.remove(DEFAULT_LOCAL_NAME) {
            for entry in removed {
                if let Some(name) = &entry.export_name {
                    self.export_names.remove(name);
                }
            }
        }
    }

    /// Number every distinct exported local, then every regular import.
    ///
    /// The two counters are independent and both start at zero. An
    /// exported local bound immutably marks all of its export aliases
    /// constant.
    pub fn assign_module_variable_slots(&mut self, scope: &mut impl ModuleScope) -> ModuleSlots {
        let mut slots = ModuleSlots::default();

        let mut index = 0u32;
        for (local_name, exports) in self.local_exports.iter_mut() {
            let Some(kind) = scope.find_local(local_name) else {
                tracing::trace!(local = local_name.as_str(), "exported local has no binding");
                continue;
            };
            scope.assign_slot(local_name, ModuleSlot::Export(index));
            slots.exports.insert(local_name.clone(), index);
            index += 1;
            if kind.is_immutable() {
                for export in exports.iter_mut() {
                    export.is_constant = true;
                }
            }
        }

        let mut index = 0u32;
        for local_name in self.regular_imports.keys() {
            if scope.find_local(local_name).is_none() {
                tracing::trace!(local = local_name.as_str(), "import has no binding");
                continue;
            }
            scope.assign_slot(local_name, ModuleSlot::Import(index));
            slots.imports.insert(local_name.clone(), index);
            index += 1;
        }

        tracing::debug!(
            exports = slots.exports.len(),
            imports = slots.imports.len(),
            "assigned module variable slots"
        );
        slots
    }

    /// Request index a local import binding came from.
    pub fn module_request_index_for(&self, local_name: &str) -> Option<usize> {
        if let Some(entry) = self.regular_imports.get(local_name) {
            return Some(entry.request_index);
        }
        self.namespace_imports
            .iter()
            .find(|entry| entry.local_name == local_name)
            .map(|entry| entry.request_index)
    }

    pub fn request(&self, index: usize) -> Option<&ModuleRequest> {
        self.requests.get_index(index)
    }

    pub fn requests(&self) -> impl Iterator<Item = &ModuleRequest> {
        self.requests.iter()
    }

    pub fn has_lazy_import(&self) -> bool {
        self.has_lazy_import
    }

    pub fn regular_imports(&self) -> &BTreeMap<String, ImportEntry> {
        &self.regular_imports
    }

    pub fn namespace_imports(&self) -> &[ImportEntry] {
        &self.namespace_imports
    }

    pub fn local_exports(&self) -> &BTreeMap<String, Vec<ExportEntry>> {
        &self.local_exports
    }

    pub fn indirect_exports(&self) -> &[ExportEntry] {
        &self.indirect_exports
    }

    pub fn star_exports(&self) -> &[ExportEntry] {
        &self.star_exports
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
            && self.regular_imports.is_empty()
            && self.namespace_imports.is_empty()
            && self.local_exports.is_empty()
            && self.indirect_exports.is_empty()
            && self.star_exports.is_empty()
    }

    fn is_valid_request(&self, index: usize) -> bool {
        index < self.requests.len()
    }

    fn claim_export_name(&mut self, entry: &ExportEntry) -> bool {
        match &entry.export_name {
            Some(name) => self.export_names.insert(name.clone()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    #[derive(Default)]
    struct FakeScope {
        bindings: FxHashMap<String, VariableKind>,
        slots: FxHashMap<String, ModuleSlot>,
    }

    impl FakeScope {
        fn with(bindings: &[(&str, VariableKind)]) -> Self {
            Self {
                bindings: bindings.iter().map(|(n, k)| (n.to_string(), *k)).collect(),
                slots: FxHashMap::default(),
            }
        }
    }

    impl ModuleScope for FakeScope {
        fn find_local(&self, name: &str) -> Option<VariableKind> {
            self.bindings.get(name).copied()
        }

        fn assign_slot(&mut self, name: &str, slot: ModuleSlot) {
            self.slots.insert(name.to_string(), slot);
        }
    }

    fn import(record: &mut ModuleRecord, source: &str, name: &str) {
        let request = record.add_module_request(source, false);
        record.add_import_entry(ImportEntry::named(request, name, name, DUMMY_SP, DUMMY_SP));
    }

    fn export(record: &mut ModuleRecord, local: &str, exported: &str) -> bool {
        record.add_local_export_entry(ExportEntry::local(exported, local, DUMMY_SP, DUMMY_SP))
    }

    #[test]
    fn requests_are_deduplicated_by_source_and_laziness() {
        let mut record = ModuleRecord::new();
        let eager = record.add_module_request("m", false);
        assert_eq!(record.add_module_request("m", false), eager);
        assert!(!record.has_lazy_import());

        let lazy = record.add_module_request("m", true);
        assert_ne!(lazy, eager);
        assert!(record.has_lazy_import());
        assert_eq!(record.request(lazy).unwrap().source, "m");
        assert_eq!(record.requests().count(), 2);
    }

    #[test]
    fn export_before_import_becomes_indirect() {
        let mut export_first = ModuleRecord::new();
        assert!(export(&mut export_first, "x", "x"));
        import(&mut export_first, "m", "x");

        let mut import_first = ModuleRecord::new();
        import(&mut import_first, "m", "x");
        assert!(export(&mut import_first, "x", "x"));

        for record in [&export_first, &import_first] {
            assert!(record.local_exports().is_empty());
            assert_eq!(record.indirect_exports().len(), 1);
            let entry = &record.indirect_exports()[0];
            assert_eq!(entry.export_name.as_deref(), Some("x"));
            assert_eq!(entry.import_name.as_deref(), Some("x"));
            assert_eq!(entry.local_name, None);
            assert_eq!(entry.request_index, Some(0));
            assert_eq!(record.request(0).unwrap().source, "m");
        }
    }

    #[test]
    fn promotion_moves_every_alias() {
        let mut record = ModuleRecord::new();
        assert!(export(&mut record, "x", "a"));
        assert!(export(&mut record, "x", "b"));
        let request = record.add_module_request("m", false);
        record.add_import_entry(ImportEntry::named(request, "x", "y", DUMMY_SP, DUMMY_SP));

        assert!(record.local_exports().is_empty());
        let names: Vec<_> = record
            .indirect_exports()
            .iter()
            .map(|e| (e.export_name.as_deref().unwrap(), e.import_name.as_deref().unwrap()))
            .collect();
        assert_eq!(names, [("a", "y"), ("b", "y")]);
        // Promotion keeps the names claimed.
        assert!(!export(&mut record, "z", "a"));
    }

    #[test]
    fn duplicate_export_names_are_rejected_without_change() {
        let mut record = ModuleRecord::new();
        assert!(export(&mut record, "a", "x"));
        let before = record.clone();

        assert!(!export(&mut record, "b", "x"));
        let request = record.add_module_request("m", false);
        assert!(!record.add_indirect_export_entry(ExportEntry::indirect(request, "x", "y", DUMMY_SP)));

        assert_eq!(record.local_exports(), before.local_exports());
        assert!(record.indirect_exports().is_empty());
        // The request added along the way is unrelated to the rejection.
        assert_eq!(record.requests().count(), 1);
    }

    #[test]
    fn first_import_of_a_local_name_wins() {
        let mut record = ModuleRecord::new();
        import(&mut record, "a", "x");
        import(&mut record, "b", "x");
        assert_eq!(record.regular_imports().len(), 1);
        assert_eq!(record.module_request_index_for("x"), Some(0));
    }

    #[test]
    fn star_exports_are_never_ambiguous_here() {
        let mut record = ModuleRecord::new();
        let a = record.add_module_request("a", false);
        let b = record.add_module_request("b", false);
        record.add_star_export_entry(ExportEntry::star(a, DUMMY_SP));
        record.add_star_export_entry(ExportEntry::star(b, DUMMY_SP));
        record.add_star_export_entry(ExportEntry::star(b, DUMMY_SP));

        assert_eq!(record.star_exports().len(), 3);
        assert_ne!(record.star_exports()[0].request_index, record.star_exports()[1].request_index);
    }

    #[test]
    fn namespace_imports_are_found_after_regular_ones() {
        let mut record = ModuleRecord::new();
        let request = record.add_module_request("ns", false);
        record.add_star_import_entry(ImportEntry::namespace(request, "ns", DUMMY_SP));
        assert_eq!(record.module_request_index_for("ns"), Some(request));
        assert_eq!(record.module_request_index_for("missing"), None);
    }

    #[test]
    fn removing_the_default_export_frees_its_name() {
        let mut record = ModuleRecord::new();
        assert!(export(&mut record, DEFAULT_LOCAL_NAME, "default"));
        record.remove_default_local_export_entry();
        assert!(record.local_exports().is_empty());
        assert!(export(&mut record, "__default0", "default"));
    }

    #[test]
    fn export_and_import_slots_use_independent_counters() {
        let mut record = ModuleRecord::new();
        export(&mut record, "a", "a");
        export(&mut record, "a", "alias");
        export(&mut record, "b", "b");
        for name in ["p", "q", "r"] {
            import(&mut record, "m", name);
        }
        let mut scope = FakeScope::with(&[
            ("a", VariableKind::Const),
            ("b", VariableKind::Let),
            ("p", VariableKind::Import),
            ("q", VariableKind::Import),
            ("r", VariableKind::Import),
        ]);

        let slots = record.assign_module_variable_slots(&mut scope);

        assert_eq!(slots.exports.values().copied().collect::<Vec<_>>(), [0, 1]);
        assert_eq!(slots.imports.values().copied().collect::<Vec<_>>(), [0, 1, 2]);
        assert_eq!(scope.slots["a"], ModuleSlot::Export(0));
        assert_eq!(scope.slots["b"], ModuleSlot::Export(1));
        assert_eq!(scope.slots["r"], ModuleSlot::Import(2));

        assert!(record.local_exports()["a"].iter().all(|e| e.is_constant));
        assert!(record.local_exports()["b"].iter().all(|e| !e.is_constant));
    }

    #[test]
    fn slot_assignment_is_deterministic() {
        let build = || {
            let mut record = ModuleRecord::new();
            export(&mut record, "z", "z");
            export(&mut record, "y", "y");
            import(&mut record, "m", "k");
            record
        };
        let bindings = [
            ("y", VariableKind::Var),
            ("z", VariableKind::Var),
            ("k", VariableKind::Import),
        ];
        let first = build().assign_module_variable_slots(&mut FakeScope::with(&bindings));
        let second = build().assign_module_variable_slots(&mut FakeScope::with(&bindings));
        assert_eq!(first, second);
        assert_eq!(first.exports["y"], 0);
    }

    #[test]
    fn scope_view_writes_slots_into_the_tree() {
        let mut tree = ScopeTree::new(DUMMY_SP);
        let root = tree.root();
        tree.declare(root, "v", VariableKind::Const, DUMMY_SP);
        let mut record = ModuleRecord::new();
        export(&mut record, "v", "v");

        record.assign_module_variable_slots(&mut ScopeView::module(&mut tree));
        assert_eq!(tree.find_local(root, "v").unwrap().slot, Some(ModuleSlot::Export(0)));
    }

    #[test]
    fn serializes_without_spans() {
        let mut record = ModuleRecord::new();
        import(&mut record, "m", "a");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["requests"][0]["source"], "m");
        assert!(json["regular_imports"]["a"].get("local_site").is_none());
    }
}
