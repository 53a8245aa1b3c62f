//! Class-level driver of the instrumentation passes.
//!
//! For every eligible method the [`Instrumenter`] runs the scan (enumerator and filters),
//! assigns slots to the surviving records, splits the surviving branches and inserts the
//! probes. The class record goes to the [`CoverageSession`], which declares the counter array
//! to the registry; the rewritten class goes back to the caller.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use covscope::prelude::*;
//!
//! let mut asm = BodyAssembler::new();
//! asm.line(3).iconst(1).ireturn();
//! let mut class = ClassInfo::new("pkg/Answer", 61);
//! class.methods.push(MethodInfo::new("one", "()I", AccessFlags::STATIC, asm.build()));
//!
//! let session = Arc::new(CoverageSession::new(InstrumentationOptions::default()));
//! let instrumenter = Instrumenter::new(Arc::clone(&session));
//!
//! match instrumenter.instrument(&class) {
//!     Instrumented::Rewritten(rewritten) => assert!(rewritten.methods.len() >= 1),
//!     other => panic!("unexpected {other:?}"),
//! }
//! assert_eq!(session.registry().slot_count("pkg/Answer"), Some(1));
//! ```

use std::sync::Arc;

use log::{debug, warn};

use crate::{
    class::{ClassInfo, MethodInfo},
    coverage::{ClassRecord, LineMapping},
    instrument::{
        context::{MethodScan, MethodScope},
        enumerator::scan_method,
        filters::{FilterRegistry, DEFAULT_STUB_SUFFIX},
        layout::{assign_slots, MethodSlots},
        probe::{insert_probes, ProbeConfig},
        split::split_branches,
        strategy::strategy,
        InstrumentationOptions,
    },
    runtime::{
        registry::{HITS_FIELD, HITS_INIT},
        CoverageSession,
    },
};

/// Why a class was left as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No method kept a line record
    NoExecutableCode,
    /// The class already carries counter members
    AlreadyInstrumented,
}

/// Outcome of instrumenting one class.
#[derive(Debug, Clone, PartialEq)]
pub enum Instrumented {
    /// The class with probes and counter members added
    Rewritten(ClassInfo),
    /// Nothing to instrument; hand the original class to the runtime
    Skipped(SkipReason),
    /// Malformed input; hand the original class to the runtime
    Unchanged,
}

/// Rewrites classes for one [`CoverageSession`].
#[derive(Debug)]
pub struct Instrumenter {
    session: Arc<CoverageSession>,
    filters: FilterRegistry,
}

impl Instrumenter {
    /// Creates an instrumenter with the built-in filters.
    #[must_use]
    pub fn new(session: Arc<CoverageSession>) -> Self {
        Self::with_filters(session, FilterRegistry::standard())
    }

    /// Creates an instrumenter with a custom filter list.
    #[must_use]
    pub fn with_filters(session: Arc<CoverageSession>, filters: FilterRegistry) -> Self {
        Instrumenter { session, filters }
    }

    /// Options of the session.
    #[must_use]
    pub fn options(&self) -> &InstrumentationOptions {
        self.session.options()
    }

    /// The session records are registered with.
    #[must_use]
    pub fn session(&self) -> &Arc<CoverageSession> {
        &self.session
    }

    /// Returns `true` if the method gets line and branch records.
    #[must_use]
    pub fn is_eligible(&self, method: &MethodInfo) -> bool {
        if method.body.is_none() || method.is_bridge() {
            return false;
        }
        if method.is_synthetic() {
            return self.options().synthetic
                || method.is_lambda()
                || method.name.ends_with(DEFAULT_STUB_SUFFIX);
        }
        true
    }

    /// Instruments one class.
    ///
    /// Never fails: a class whose code does not validate is reported as
    /// [`Instrumented::Unchanged`] with a warning.
    pub fn instrument(&self, class: &ClassInfo) -> Instrumented {
        if class.field(HITS_FIELD).is_some()
            || class.methods.iter().any(|method| method.name == HITS_INIT)
        {
            debug!("{} is already instrumented", class.name);
            return Instrumented::Skipped(SkipReason::AlreadyInstrumented);
        }

        let scans = match self.scan_class(class) {
            Ok(scans) => scans,
            Err(message) => {
                warn!("{}: {message}, left unchanged", class.name);
                return Instrumented::Unchanged;
            }
        };

        let options = self.options();
        let mut record = ClassRecord::new(&class.name);
        record.source_file.clone_from(&class.source_file);
        record.mapping = class.source_debug.as_deref().and_then(|text| {
            LineMapping::parse(text)
                .map_err(|e| warn!("{}: ignoring source mapping: {e}", class.name))
                .ok()
        });

        let mut layouts: Vec<(usize, MethodScan, MethodSlots)> = Vec::with_capacity(scans.len());
        for (index, scan) in scans {
            let signature = class.methods[index].signature();
            let slots = assign_slots(&mut record, &signature, &scan, options.instructions);
            layouts.push((index, scan, slots));
        }
        record.fully_analyzed = true;

        if record.is_empty() {
            debug!("{} has no executable lines", class.name);
            self.session.register(record);
            return Instrumented::Skipped(SkipReason::NoExecutableCode);
        }

        let kind = options.strategy_for(class);
        let strategy = strategy(kind, &class.name, options.hits);
        let config = ProbeConfig {
            strategy: strategy.as_ref(),
            mode: options.hits,
            trace_class: options.tracking.then_some(class.name.as_str()),
        };

        let mut rewritten = class.clone();
        for (index, scan, slots) in &layouts {
            let method = &mut rewritten.methods[*index];
            if let Some(body) = method.body.take() {
                let split = split_branches(&body, scan);
                method.body = Some(insert_probes(split, slots, config));
            }
        }
        strategy.prepare_class(&mut rewritten);

        debug!(
            "instrumented {} ({} methods, {} lines, {} slots, {} strategy)",
            class.name,
            layouts.len(),
            record.line_count(),
            record.slot_count,
            kind
        );
        self.session.register(record);
        Instrumented::Rewritten(rewritten)
    }

    /// Scans every eligible method; returns the scans that kept at least one line.
    fn scan_class(&self, class: &ClassInfo) -> Result<Vec<(usize, MethodScan)>, String> {
        let mut scans = Vec::new();
        for (index, method) in class.methods.iter().enumerate() {
            if !self.is_eligible(method) {
                continue;
            }
            let Some(body) = &method.body else {
                continue;
            };
            body.validate()
                .map_err(|e| format!("invalid code in {}: {e}", method.signature()))?;

            let scan = scan_method(
                MethodScope::new(class, method),
                body,
                self.options(),
                &self.filters,
            );
            if !scan.is_empty() {
                scans.push((index, scan));
            }
        }
        Ok(scans)
    }
}
