//! Intake capability: free-text request -> structured job scope.
//!
//! Prompts the model to extract trade, services, urgency, and project
//! type from the customer's description. A reply that cannot be parsed
//! falls back to a generic scope rather than failing the job; transport
//! errors and timeouts surface as stage failures.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::domain::{JobRequest, JobScope, Stage, Urgency};

use super::claude::{extract_json_object, ClaudeClient};
use super::{StageAdapter, StageError};

const SERVICE: &str = "intake";
const MAX_TOKENS: u32 = 1024;

/// Model-backed intake analyzer
pub struct ClaudeIntake {
    client: ClaudeClient,
    timeout: Duration,
}

/// Fields as requested from the model, before defaults are applied
#[derive(Debug, Default, Deserialize)]
struct ScopeDraft {
    #[serde(default)]
    trade: Option<String>,
    #[serde(default)]
    services: Vec<String>,
    #[serde(default)]
    urgency: Option<String>,
    #[serde(default)]
    project_type: Option<String>,
    #[serde(default)]
    budget_hint: Option<String>,
    #[serde(default)]
    location_requirements: Option<String>,
}

impl ClaudeIntake {
    pub fn new(client: ClaudeClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn prompt(request: &JobRequest) -> String {
        format!(
            "Analyze this job request and extract structured information.\n\n\
             Job Description: {}\n\n\
             Extract:\n\
             1. The primary trade/profession needed\n\
             2. Specific services required\n\
             3. Project urgency level\n\
             4. Budget tier if mentioned\n\
             5. Type of project\n\n\
             Respond with ONLY a JSON object matching this schema:\n\
             {{\n\
               \"trade\": \"primary trade category\",\n\
               \"services\": [\"service1\", \"service2\"],\n\
               \"urgency\": \"low|normal|high|emergency\",\n\
               \"budget_hint\": \"low|medium|high|premium\",\n\
               \"project_type\": \"installation|repair|maintenance|renovation\",\n\
               \"location_requirements\": \"any specific location notes\"\n\
             }}",
            request.prompt
        )
    }

    /// Generic scope used when the model reply is unusable. Keeps the
    /// pipeline moving with a broad directory query instead of failing
    /// the whole job over a formatting hiccup.
    fn fallback_scope(request: &JobRequest) -> JobScope {
        JobScope {
            job_id: request.job_id,
            trade: "General Contractor".into(),
            services: vec!["general services".into()],
            urgency: Urgency::Normal,
            project_type: "general".into(),
            budget_hint: Some("medium".into()),
            location_requirements: None,
        }
    }

    fn scope_from_reply(request: &JobRequest, reply: &str) -> JobScope {
        let Some(value) = extract_json_object(reply) else {
            warn!(job_id = %request.job_id, "no JSON object in intake reply, using fallback scope");
            return Self::fallback_scope(request);
        };

        let draft: ScopeDraft = match serde_json::from_value(value) {
            Ok(draft) => draft,
            Err(e) => {
                warn!(job_id = %request.job_id, error = %e, "unparseable intake reply, using fallback scope");
                return Self::fallback_scope(request);
            }
        };

        let services = if draft.services.is_empty() {
            vec!["general services".into()]
        } else {
            draft.services
        };

        JobScope {
            job_id: request.job_id,
            trade: draft.trade.unwrap_or_else(|| "General Contractor".into()),
            services,
            urgency: draft
                .urgency
                .as_deref()
                .map(Urgency::parse_lenient)
                .unwrap_or_default(),
            project_type: draft.project_type.unwrap_or_else(|| "general".into()),
            budget_hint: draft.budget_hint,
            location_requirements: draft.location_requirements,
        }
    }
}

#[async_trait]
impl StageAdapter for ClaudeIntake {
    type Input = JobRequest;
    type Output = JobScope;

    fn stage(&self) -> Stage {
        Stage::Intake
    }

    fn name(&self) -> &str {
        SERVICE
    }

    async fn invoke(&self, input: JobRequest) -> Result<JobScope, StageError> {
        let prompt = Self::prompt(&input);
        let reply = self
            .client
            .complete(SERVICE, &prompt, MAX_TOKENS, self.timeout)
            .await?;
        Ok(Self::scope_from_reply(&input, &reply))
    }
}
