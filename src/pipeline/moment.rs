//! Points in the pipeline at which response interceptors run.

use std::fmt;

/// A named point in a request's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Moment {
    DataValidationFailed,
    InterceptorPreventedProgression,
    InterceptorPreventedProgressionWithOkResponse,
    InterceptorPreventedProgressionWithErrorResponse,
    GuardPreventedProgression,
    HandlerFinished,
    HandlerFinishedWithOkResponse,
    HandlerFinishedWithErrorResponse,
    BeforeWritingToClient,
    Always,
}

impl Moment {
    /// Moment used by interceptors that do not declare any.
    pub const DEFAULT: Moment = Moment::HandlerFinishedWithOkResponse;

    pub const ALL: [Moment; 10] = [
        Moment::DataValidationFailed,
        Moment::InterceptorPreventedProgression,
        Moment::InterceptorPreventedProgressionWithOkResponse,
        Moment::InterceptorPreventedProgressionWithErrorResponse,
        Moment::GuardPreventedProgression,
        Moment::HandlerFinished,
        Moment::HandlerFinishedWithOkResponse,
        Moment::HandlerFinishedWithErrorResponse,
        Moment::BeforeWritingToClient,
        Moment::Always,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Moment::DataValidationFailed => "data-validation-failed",
            Moment::InterceptorPreventedProgression => "interceptor-prevented-progression",
            Moment::InterceptorPreventedProgressionWithOkResponse => {
                "interceptor-prevented-progression-with-ok-response"
            }
            Moment::InterceptorPreventedProgressionWithErrorResponse => {
                "interceptor-prevented-progression-with-error-response"
            }
            Moment::GuardPreventedProgression => "guard-prevented-progression",
            Moment::HandlerFinished => "handler-finished",
            Moment::HandlerFinishedWithOkResponse => "handler-finished-with-ok-response",
            Moment::HandlerFinishedWithErrorResponse => "handler-finished-with-error-response",
            Moment::BeforeWritingToClient => "before-writing-to-client",
            Moment::Always => "always",
        }
    }

    pub fn parse(tag: &str) -> Option<Moment> {
        Moment::ALL.into_iter().find(|m| m.as_str() == tag)
    }

    /// The generic category an outcome-specific moment belongs to.
    pub fn parent(self) -> Option<Moment> {
        match self {
            Moment::InterceptorPreventedProgressionWithOkResponse
            | Moment::InterceptorPreventedProgressionWithErrorResponse => {
                Some(Moment::InterceptorPreventedProgression)
            }
            Moment::HandlerFinishedWithOkResponse | Moment::HandlerFinishedWithErrorResponse => {
                Some(Moment::HandlerFinished)
            }
            _ => None,
        }
    }

    /// Moment groups consulted, in order, when the pipeline ends at `self`.
    pub fn dispatch_order(self) -> Vec<Moment> {
        let mut order = Vec::with_capacity(4);
        // Parent categories and the trailing pair are only reached through
        // a concrete outcome.
        if !matches!(
            self,
            Moment::InterceptorPreventedProgression
                | Moment::HandlerFinished
                | Moment::BeforeWritingToClient
                | Moment::Always
        ) {
            order.push(self);
        }
        if let Some(parent) = self.parent() {
            order.push(parent);
        }
        order.push(Moment::BeforeWritingToClient);
        order.push(Moment::Always);
        order
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Indices of a route's response interceptors grouped by moment.
///
/// Built once per route; dispatch only reads it.
#[derive(Debug, Clone, Default)]
pub struct MomentTable {
    groups: [Vec<usize>; 10],
}

impl MomentTable {
    /// `moments[i]` lists the moments interceptor `i` runs at.
    pub fn build<'a, I>(moments: I) -> Self
    where
        I: IntoIterator<Item = &'a [Moment]>,
    {
        let mut table = MomentTable::default();
        for (index, declared) in moments.into_iter().enumerate() {
            if declared.is_empty() {
                table.groups[Moment::DEFAULT as usize].push(index);
            }
            for moment in declared {
                let group = &mut table.groups[*moment as usize];
                if !group.contains(&index) {
                    group.push(index);
                }
            }
        }
        table
    }

    pub fn group(&self, moment: Moment) -> &[usize] {
        &self.groups[moment as usize]
    }

    /// Interceptor indices to run when the pipeline ends at `moment`.
    ///
    /// Group order follows [`Moment::dispatch_order`]; within a group the
    /// registration order holds. An interceptor listed in several groups
    /// runs once, at its first position.
    pub fn dispatch(&self, moment: Moment) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        for group in moment.dispatch_order() {
            for &index in self.group(group) {
                if !out.contains(&index) {
                    out.push(index);
                }
            }
        }
        out
    }
}
