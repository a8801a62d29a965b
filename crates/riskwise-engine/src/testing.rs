//! In-memory collaborators for engine tests.

use futures::future::BoxFuture;
use riskwise_core::context::RelatedSummary;
use riskwise_core::suggest::{PresentedOption, Selection, SelectionMode};
use riskwise_core::templates::{CategoryTemplate, ControlTemplate, RiskTemplate};
use riskwise_core::{
    AiGateway, EntityLookup, EntityType, FieldType, GatewayError, GenerationOptions, Notifier,
    QuotaDecision, QuotaGuard, QuotaState, Storage, SuggestionView, TemplateLookup, ToastLevel,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MapStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MapStorage {
    pub fn with(self, key: &str, value: &str) -> Self {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self
    }
}

impl Storage for MapStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MapEntities {
    entries: HashMap<(EntityType, String), RelatedSummary>,
}

impl MapEntities {
    pub fn with(mut self, entity: EntityType, id: &str, name: &str, kind: Option<&str>) -> Self {
        self.entries.insert(
            (entity, id.to_string()),
            RelatedSummary {
                id: id.to_string(),
                name: name.to_string(),
                kind: kind.map(str::to_string),
                status: None,
                likelihood: None,
                impact: None,
            },
        );
        self
    }
}

impl EntityLookup for MapEntities {
    fn get_by_id(&self, entity: EntityType, id: &str) -> Option<RelatedSummary> {
        self.entries.get(&(entity, id.to_string())).cloned()
    }
}

/// Small technology template set
#[derive(Default)]
pub struct StaticTemplates {
    pub empty: bool,
}

impl TemplateLookup for StaticTemplates {
    fn categories(&self, _industry: &str) -> Vec<CategoryTemplate> {
        if self.empty {
            return Vec::new();
        }
        vec![
            CategoryTemplate {
                id: "cyber".into(),
                label: "Cyber Security".into(),
                description: Some("Attacks on systems and data".into()),
                typical_likelihood: Some(4),
                typical_impact: Some(5),
            },
            CategoryTemplate {
                id: "third-party".into(),
                label: "Third-Party".into(),
                description: None,
                typical_likelihood: Some(3),
                typical_impact: Some(3),
            },
        ]
    }

    fn risks(&self, _industry: &str, category: Option<&str>) -> Vec<RiskTemplate> {
        if self.empty {
            return Vec::new();
        }
        let all = vec![
            RiskTemplate {
                title: "Data Breach".into(),
                category: "cyber".into(),
                description: Some("Unauthorised access to customer data".into()),
                root_causes: vec!["Phishing".into(), "Unpatched systems".into()],
                consequences: vec!["Regulatory fines".into(), "Loss of customer trust".into()],
            },
            RiskTemplate {
                title: "Ransomware Attack".into(),
                category: "cyber".into(),
                description: Some("Encryption of critical systems by malware".into()),
                root_causes: vec!["Phishing".into(), "Weak backups".into()],
                consequences: vec!["Service outage".into()],
            },
            RiskTemplate {
                title: "Vendor Failure".into(),
                category: "third-party".into(),
                description: None,
                root_causes: vec!["Vendor insolvency".into()],
                consequences: vec!["Service outage".into()],
            },
        ];
        all.into_iter()
            .filter(|r| category.map_or(true, |c| r.category == c))
            .collect()
    }

    fn controls(&self, _industry: &str, category: Option<&str>) -> Vec<ControlTemplate> {
        if self.empty {
            return Vec::new();
        }
        let all = vec![
            ControlTemplate {
                title: "Multi-factor authentication".into(),
                control_type: "preventive".into(),
                category: Some("cyber".into()),
                description: Some("Second factor required for all remote access".into()),
                evidence: vec!["MFA enrolment report".into()],
            },
            ControlTemplate {
                title: "Security monitoring".into(),
                control_type: "detective".into(),
                category: Some("cyber".into()),
                description: None,
                evidence: vec!["SIEM alert log".into()],
            },
        ];
        all.into_iter()
            .filter(|c| category.map_or(true, |cat| c.category.as_deref() == Some(cat)))
            .collect()
    }

    fn owner_roles(&self, _industry: &str) -> Vec<String> {
        if self.empty {
            return Vec::new();
        }
        vec!["CISO".into(), "CTO".into(), "Head of Operations".into()]
    }
}

/// Returns queued responses in order; errors once the queue runs dry
#[derive(Default)]
pub struct ScriptedGateway {
    responses: Mutex<VecDeque<Result<String, GatewayError>>>,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn replying(response: &str) -> Self {
        Self::default().then(Ok(response.to_string()))
    }

    pub fn failing(err: GatewayError) -> Self {
        Self::default().then(Err(err))
    }

    pub fn then(self, response: Result<String, GatewayError>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

impl AiGateway for ScriptedGateway {
    fn invoke<'a>(
        &'a self,
        user_prompt: &'a str,
        _options: &'a GenerationOptions,
    ) -> BoxFuture<'a, Result<String, GatewayError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(user_prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GatewayError::EmptyResponse))
        })
    }
}

pub struct CountingQuota {
    limit: u32,
    used: AtomicU32,
    notices: AtomicU32,
    read_only: bool,
}

impl CountingQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            used: AtomicU32::new(0),
            notices: AtomicU32::new(0),
            read_only: false,
        }
    }

    /// Allows calls but cannot record them
    pub fn read_only(limit: u32) -> Self {
        Self {
            read_only: true,
            ..Self::new(limit)
        }
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn notices(&self) -> u32 {
        self.notices.load(Ordering::SeqCst)
    }
}

impl QuotaGuard for CountingQuota {
    fn can_make_call(&self) -> QuotaDecision {
        if self.used() < self.limit {
            QuotaDecision::allow()
        } else {
            QuotaDecision::deny("Monthly AI limit reached")
        }
    }

    fn record_call(&self) -> Result<(), String> {
        if self.read_only {
            return Err("quota store is read-only".to_string());
        }
        self.used.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn show_limit_notice(&self, _decision: &QuotaDecision) {
        self.notices.fetch_add(1, Ordering::SeqCst);
    }

    fn state(&self) -> QuotaState {
        QuotaState {
            used: self.used(),
            limit: self.limit,
            period: "2025-01".to_string(),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub acknowledged: Mutex<Vec<String>>,
    pub toasts: Mutex<Vec<(String, ToastLevel)>>,
}

impl RecordingNotifier {
    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }

    pub fn toasts(&self) -> Vec<(String, ToastLevel)> {
        self.toasts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn acknowledge(&self, field_id: &str) {
        self.acknowledged.lock().unwrap().push(field_id.to_string());
    }

    fn toast(&self, message: &str, level: ToastLevel) {
        self.toasts.lock().unwrap().push((message.to_string(), level));
    }
}

/// Answers every `choose` with a fixed selection and records what it saw
pub struct ScriptedView {
    pub answer: Selection,
    pub shown: Vec<PresentedOption>,
    pub mode: Option<SelectionMode>,
    pub empty_message: Option<String>,
}

impl ScriptedView {
    pub fn answering(answer: Selection) -> Self {
        Self {
            answer,
            shown: Vec::new(),
            mode: None,
            empty_message: None,
        }
    }
}

impl SuggestionView for ScriptedView {
    fn choose(
        &mut self,
        _field: FieldType,
        options: &[PresentedOption],
        mode: SelectionMode,
    ) -> Selection {
        self.shown = options.to_vec();
        self.mode = Some(mode);
        self.answer.clone()
    }

    fn show_empty(&mut self, _field: FieldType, message: &str) {
        self.empty_message = Some(message.to_string());
    }
}
