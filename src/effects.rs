//! Side-Effect Propagator.
//!
//! Two passes populate `CodeIndex::effects`:
//!
//! 1. A local pass over each symbol's own source text, classifying
//!    syntactic cues (assignment into a field/parameter, `println!`/`std::io`
//!    calls, channel sends, `await`, `?`/`panic!`/`unwrap`, dynamic
//!    dispatch) into [`EffectSet`] bits.
//! 2. A transitive fixed-point pass over the call graph: a caller's
//!    transitive set is the union of every callee's local-and-transitive
//!    set, repeated to a fixed point the same way reachability is computed
//!    by walking a worklist of call edges.
//!
//! Confidence is the meet (minimum) of a symbol's own evidence quality and
//! its callees' confidence — a symbol that calls into unresolved or dynamic
//! targets can't be rated above `Low` no matter how clean its own body is.

use crate::ids::SymbolId;
use crate::state::CodeIndex;
use crate::types::{AccessPattern, Confidence, EffectSet, ErrorBehavior, SideEffectInfo};
use std::collections::{HashMap, HashSet, VecDeque};

/// Result of the local pass over one symbol's own source text: effect bits
/// plus the access-pattern/error-behavior/defer-count facts that aren't
/// aggregated transitively (see [`SideEffectInfo`]).
#[derive(Debug, Clone)]
pub struct LocalEffects {
    pub set: EffectSet,
    pub reasons: Vec<String>,
    pub access_pattern: AccessPattern,
    pub error_behavior: ErrorBehavior,
    pub defer_count: u32,
}

/// Classify a symbol's own source text into local effect bits. `source` is
/// the full file contents; `start`/`end` are the symbol's byte span within
/// it, as recorded in `Location`.
pub fn local_effects(source: &str, start: usize, end: usize) -> LocalEffects {
    let body = source.get(start..end.min(source.len())).unwrap_or("");
    let mut set = EffectSet::EMPTY;
    let mut reasons = Vec::new();

    let mut mark = |bit: EffectSet, reason: &str| {
        set.insert(bit);
        reasons.push(reason.to_string());
    };

    if body.contains("println!") || body.contains("eprintln!") || body.contains("std::io::") {
        mark(EffectSet::IO, "console/stdio call observed");
    }
    if body.contains("std::fs::") || body.contains("tokio::fs::") {
        mark(EffectSet::IO, "filesystem call observed");
    }
    if body.contains("sqlx::") || body.contains("diesel::") || body.contains(".query(") {
        mark(EffectSet::DATABASE, "database client call observed");
    }
    if body.contains("reqwest::") || body.contains("hyper::") || body.contains(".connect(") {
        mark(EffectSet::NETWORK, "network client call observed");
    }
    if body.contains("panic!") || body.contains(".unwrap()") || body.contains(".expect(") {
        mark(EffectSet::THROW, "panicking call observed");
    }
    if body.contains('?') {
        mark(EffectSet::THROW, "fallible `?` propagation observed");
    }
    if body.contains("Sender<") || body.contains(".send(") || body.contains("mpsc::") {
        mark(EffectSet::CHANNEL, "channel send observed");
    }
    if body.contains("async ") || body.contains(".await") {
        mark(EffectSet::ASYNC, "async function or await point");
    }
    if body.contains("dyn ") || body.contains("Box<dyn") {
        mark(EffectSet::DYNAMIC_CALL, "dynamic dispatch through a trait object");
    }
    if body.contains("std::mem::transmute") || body.contains("::<dyn Any>") {
        mark(EffectSet::REFLECTION, "reflective/unsafe type punning observed");
    }
    if body.contains("self.") && (body.contains(" = ") || body.contains("+=") || body.contains("-=")) {
        mark(EffectSet::RECEIVER_WRITE, "assignment through `self.` observed");
    }
    if body.contains("static mut") || body.contains("GLOBAL") {
        mark(EffectSet::GLOBAL_WRITE, "write to apparent global state");
    }
    if body.contains("move |") {
        mark(EffectSet::CLOSURE_WRITE, "closure captures by move");
    }

    let access_pattern = classify_access_pattern(body, set);
    let error_behavior = classify_error_behavior(body);
    let defer_count = count_defers(body);

    LocalEffects {
        set,
        reasons,
        access_pattern,
        error_behavior,
        defer_count,
    }
}

/// Coarse read/write shape: did the body write through a receiver/param/
/// global/closure/field, read through the receiver, both, or neither.
fn classify_access_pattern(body: &str, set: EffectSet) -> AccessPattern {
    let has_write = set.contains(EffectSet::PARAM_WRITE)
        || set.contains(EffectSet::RECEIVER_WRITE)
        || set.contains(EffectSet::GLOBAL_WRITE)
        || set.contains(EffectSet::CLOSURE_WRITE)
        || set.contains(EffectSet::FIELD_WRITE);
    let has_read = body.contains("self.") || body.contains("&self");
    match (has_read, has_write) {
        (false, false) => AccessPattern::None,
        (true, false) => AccessPattern::ReadOnly,
        (false, true) => AccessPattern::WriteOnly,
        (true, true) => AccessPattern::ReadWrite,
    }
}

/// Error-handling shape: a body can both propagate (`?`) and panic
/// (`panic!`/`.unwrap()`/`.expect()`) at different call sites.
fn classify_error_behavior(body: &str) -> ErrorBehavior {
    let panics = body.contains("panic!") || body.contains(".unwrap()") || body.contains(".expect(");
    let propagates = body.contains('?');
    match (propagates, panics) {
        (false, false) => ErrorBehavior::None,
        (true, false) => ErrorBehavior::Propagates,
        (false, true) => ErrorBehavior::Panics,
        (true, true) => ErrorBehavior::PropagatesAndPanics,
    }
}

/// Count deferred-cleanup patterns (`defer ...`/`defer(...)`) in the body.
fn count_defers(body: &str) -> u32 {
    (body.matches("defer ").count() + body.matches("defer(").count()) as u32
}

/// Run the transitive fixed-point pass over the whole call graph and
/// populate `state.effects` for every symbol that has a local pass result
/// already recorded via [`seed_local_pass`].
pub fn propagate(state: &CodeIndex) {
    // Build caller -> callees adjacency once; edges with an unresolved
    // callee contribute `Uncertain` but don't widen the worklist.
    let mut callees: HashMap<SymbolId, Vec<SymbolId>> = HashMap::new();
    let mut unresolved_calls: HashSet<SymbolId> = HashSet::new();
    for edge in state.call_edges.read().iter() {
        if edge.callee.is_resolved() {
            callees.entry(edge.caller).or_default().push(edge.callee);
        } else {
            unresolved_calls.insert(edge.caller);
        }
    }

    let mut queue: VecDeque<SymbolId> = state.effects.iter().map(|e| *e.key()).collect();
    let mut in_queue: HashSet<SymbolId> = queue.iter().copied().collect();

    while let Some(sym) = queue.pop_front() {
        in_queue.remove(&sym);

        let (local, mut reasons, access_pattern, error_behavior, defer_count) =
            match state.effects.get(&sym) {
                Some(info) => (
                    info.local,
                    info.reasons.clone(),
                    info.access_pattern,
                    info.error_behavior,
                    info.defer_count,
                ),
                None => continue,
            };

        let mut transitive = EffectSet::EMPTY;
        let mut confidence = Confidence::High;

        if unresolved_calls.contains(&sym) {
            transitive.insert(EffectSet::UNCERTAIN);
            confidence = confidence.meet(Confidence::Low);
            reasons.push("calls an unresolved callee".to_string());
        }

        if let Some(targets) = callees.get(&sym) {
            for callee in targets {
                if let Some(callee_info) = state.effects.get(callee) {
                    transitive.insert(callee_info.local);
                    transitive.insert(callee_info.transitive);
                    confidence = confidence.meet(callee_info.confidence);
                } else {
                    confidence = confidence.meet(Confidence::Medium);
                }
            }
        } else if unresolved_calls.contains(&sym) {
            // already accounted for above
        } else {
            confidence = confidence.meet(Confidence::Proven);
        }

        let is_pure = local.union(transitive).is_empty();
        let changed = match state.effects.get(&sym) {
            Some(existing) => {
                existing.transitive != transitive || existing.confidence != confidence
            }
            None => true,
        };

        state.effects.insert(
            sym,
            SideEffectInfo {
                symbol: sym,
                local,
                transitive,
                confidence,
                reasons,
                is_pure,
                access_pattern,
                error_behavior,
                defer_count,
            },
        );

        if changed {
            // Re-check callers of `sym` so the fixed point propagates upward.
            for (caller, targets) in callees.iter() {
                if targets.contains(&sym) && !in_queue.contains(caller) {
                    queue.push_back(*caller);
                    in_queue.insert(*caller);
                }
            }
        }
    }
}

/// Seed `state.effects` with each symbol's local pass result, ahead of
/// [`propagate`]. Call once per full index before `propagate`.
pub fn seed_local_pass(state: &CodeIndex) {
    for entry in state.symbols.iter() {
        let def = entry.value();
        if !def.kind.is_callable() {
            continue;
        }
        let Some(path) = state.path_for_file(def.id.file) else {
            continue;
        };
        let Some(contents) = state.file_contents.get(&path) else {
            continue;
        };
        let local = local_effects(&contents, def.location.start_byte, def.location.end_byte);
        state.effects.insert(
            def.id,
            SideEffectInfo {
                symbol: def.id,
                local: local.set,
                transitive: EffectSet::EMPTY,
                confidence: Confidence::High,
                reasons: local.reasons,
                is_pure: local.set.is_empty(),
                access_pattern: local.access_pattern,
                error_behavior: local.error_behavior,
                defer_count: local.defer_count,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_io_and_throw() {
        let source = "fn f() { println!(\"hi\"); x.unwrap() }";
        let effects = local_effects(source, 0, source.len());
        assert!(effects.set.contains(EffectSet::IO));
        assert!(effects.set.contains(EffectSet::THROW));
        assert!(!effects.reasons.is_empty());
        assert_eq!(effects.error_behavior, ErrorBehavior::Panics);
    }

    #[test]
    fn empty_body_is_pure() {
        let source = "fn f(x: i32) -> i32 { x + 1 }";
        let effects = local_effects(source, 0, source.len());
        assert!(effects.set.is_empty());
        assert_eq!(effects.access_pattern, AccessPattern::None);
        assert_eq!(effects.error_behavior, ErrorBehavior::None);
        assert_eq!(effects.defer_count, 0);
    }

    #[test]
    fn detects_propagation_vs_panic() {
        let source = "fn f() -> Result<(), E> { g()?; Ok(()) }";
        let propagates = local_effects(source, 0, source.len());
        assert_eq!(propagates.error_behavior, ErrorBehavior::Propagates);

        let source = "fn f() -> Result<(), E> { g()?; h().unwrap(); Ok(()) }";
        let both = local_effects(source, 0, source.len());
        assert_eq!(both.error_behavior, ErrorBehavior::PropagatesAndPanics);
    }

    #[test]
    fn read_write_through_self_is_read_write() {
        let source = "fn f(&mut self) { self.count = self.count + 1; }";
        let effects = local_effects(source, 0, source.len());
        assert_eq!(effects.access_pattern, AccessPattern::ReadWrite);
    }

    #[test]
    fn confidence_meet_is_minimum() {
        assert_eq!(Confidence::High.meet(Confidence::Low), Confidence::Low);
        assert_eq!(Confidence::Proven.meet(Confidence::Proven), Confidence::Proven);
    }
}
