//! Authorization (RBAC) middleware (spec §4.7 item 6, SPEC_FULL
//! §[SUPPLEMENT] Authorization middleware). Grounded on the teacher's
//! `rbac::RuleSet`/`Rule` pattern: a set of rules, each matching a claim
//! key against an expected value; an empty rule set means everyone has
//! access. Generalized from the teacher's XDS-sourced resource matching to
//! route-rule metadata: a route names the scopes it requires via its
//! `metadata` map under the `required_scopes` key (comma-separated).

use super::{DynHandler, Handler, HandlerFuture, Middleware};
use crate::context::RequestContext;
use crate::error::GatewayError;
use crate::http_types::Request;

/// A single authorization rule: `claim_key` must contain `expected_value`
/// (scopes are modeled as a JSON array of strings under the claim).
#[derive(Clone, Debug)]
pub struct Rule {
	pub claim_key: String,
	pub expected_value: String,
}

/// Empty rule set means everyone has access, mirroring the teacher's
/// `RuleSets::validate` short-circuit.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
	pub rules: Vec<Rule>,
}

impl RuleSet {
	pub fn validate(&self, claims: &crate::context::Claims) -> bool {
		if self.rules.is_empty() {
			return true;
		}
		self.rules.iter().any(|rule| Self::claim_matches(claims, rule))
	}

	fn claim_matches(claims: &crate::context::Claims, rule: &Rule) -> bool {
		match claims.0.get(&rule.claim_key) {
			Some(serde_json::Value::Array(values)) => {
				values.iter().any(|v| v.as_str() == Some(rule.expected_value.as_str()))
			}
			Some(serde_json::Value::String(s)) => s == &rule.expected_value,
			_ => false,
		}
	}
}

pub struct Authorization {
	default_rules: RuleSet,
}

impl Authorization {
	pub fn new(default_rules: RuleSet) -> Self {
		Authorization { default_rules }
	}
}

impl Middleware for Authorization {
	fn wrap(&self, next: DynHandler) -> DynHandler {
		std::sync::Arc::new(AuthorizationHandler { next, default_rules: self.default_rules.clone() })
	}
}

struct AuthorizationHandler {
	next: DynHandler,
	default_rules: RuleSet,
}

impl Handler for AuthorizationHandler {
	fn call(&self, ctx: RequestContext, req: Request) -> HandlerFuture {
		let next = self.next.clone();
		let rules = route_rules(&ctx).unwrap_or_else(|| self.default_rules.clone());

		Box::pin(async move {
			let allowed = match &ctx.claims {
				Some(claims) => rules.validate(claims),
				None => rules.rules.is_empty(),
			};
			if !allowed {
				return Err(GatewayError::forbidden("not authorized for this resource"));
			}
			next.call(ctx, req).await
		})
	}
}

/// Per-route override: a route's `metadata["required_scope"]` becomes a
/// single-rule `RuleSet` checked against the `scopes` claim.
fn route_rules(ctx: &RequestContext) -> Option<RuleSet> {
	let route = ctx.route.as_ref()?;
	let scope = route.rule.metadata.get("required_scope")?;
	Some(RuleSet { rules: vec![Rule { claim_key: "scopes".to_string(), expected_value: scope.clone() }] })
}
