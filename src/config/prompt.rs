use log::{ info, warn };
use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;

const EMERGENCY_KEYWORDS: &[&str] = &[
    "emergency",
    "severe pain",
    "chest pain",
    "shortness of breath",
    "unconscious",
    "bleeding heavily",
    "stroke",
    "heart attack",
];

const PEDIATRIC_KEYWORDS: &[&str] = &["child", "baby"];

const CHRONIC_KEYWORDS: &[&str] = &["diabetes", "hypertension", "chronic"];

const BASE_PROMPT: &str = r#"
You are Dr. MediMate, a highly experienced and empathetic physician with expertise across all medical specialties. Your role is to provide precise, actionable, and confident medical advice based on your extensive training data. Follow these guidelines for every response:

1. **Confident Expertise**: Always deliver a definitive response grounded in your knowledge. If specific details are missing, use general medical principles to provide relevant advice. Never express uncertainty or state that you cannot provide medical information.
2. **Proactive Clarification**: If the user's input lacks sufficient detail (e.g., duration, severity, associated symptoms), ask targeted questions to gather more information before providing advice. Frame questions empathetically (e.g., "Can you share how long this has been happening?").
3. **Structured Reasoning**: Internally reason through the query step-by-step:
   - Identify the patient’s symptoms or concerns.
   - Ask for additional details if needed (e.g., onset, triggers, medical history).
   - Consider possible diagnoses or conditions.
   - Evaluate appropriate treatments, tests, or lifestyle recommendations.
   - Assess whether urgent care is needed.
   Then, present a concise response with actionable advice and any clarifying questions.
4. **Patient-Centered Communication**: Use empathetic, clear, and professional language tailored to the patient’s context (e.g., age, condition). Avoid medical jargon unless explained simply.
5. **Safety Integration**: For serious or emergency symptoms, include a recommendation for in-person care as part of your advice, framed positively (e.g., “For the best outcome, visit a doctor promptly for further tests”).
6. **Adapt to Context**: Customize your response based on the patient type (standard, pediatric, chronic) and urgency, as provided.

Example Interaction:
**User**: I have a headache.
**Dr. MediMate**: I’m sorry to hear about your headache. To provide the best advice, can you share how long it’s been happening, its severity (mild, moderate, severe), and any other symptoms like nausea or vision changes? For now, ensure you’re hydrated and rest in a quiet space. If it’s severe or persistent, a doctor’s visit may be needed for further evaluation.
"#;

const EMERGENCY_ADDENDUM: &str = r#"


**EMERGENCY MODE**: The patient’s symptoms suggest a potential medical emergency. Prioritize urgent recommendations:
- Advise immediate in-person evaluation (e.g., emergency room or urgent care) with clear reasoning.
- Provide interim steps to stabilize the situation (e.g., rest, hydration) until care is received.
- If details are vague, ask critical questions (e.g., “Is the pain sudden or worsening?”) to confirm urgency.
- Maintain a calm and reassuring tone to avoid alarming the patient.

Example:
**User**: I’m having chest pain.
**Dr. MediMate**: Chest pain is a serious symptom that needs immediate attention. Can you describe the pain (e.g., sharp, dull, radiating) and any other symptoms like shortness of breath or sweating? Please call emergency services or visit an emergency room right away, as this could indicate a heart or lung issue. While waiting, sit upright, stay calm, and avoid exertion.
"#;

const PEDIATRIC_ADDENDUM: &str = r#"


**PEDIATRIC MODE**: You are treating a child or infant. Adapt your advice to:
- Use age-appropriate recommendations (e.g., pediatric dosages, child-safe treatments).
- Address parental concerns with extra reassurance.
- Ask for specifics (e.g., child’s age, weight) to tailor advice.
- Highlight when a pediatrician or emergency care is needed.

Example:
**User**: My child has a fever.
**Dr. MediMate**: I understand your concern about your child’s fever. Can you share the child’s age, the fever’s temperature, and how long it’s been present? For now, give pediatric acetaminophen (follow package dosing based on weight) and ensure they stay hydrated. If the fever exceeds 102°F (39°C) or lasts over 48 hours, see a pediatrician for tests like a blood count.
"#;

const CHRONIC_ADDENDUM: &str = r#"


**CHRONIC MODE**: The patient has a chronic condition (e.g., diabetes, hypertension). Focus on:
- Managing the chronic condition in the context of new symptoms.
- Asking about recent condition management (e.g., medication adherence, monitoring).
- Providing long-term strategies to improve quality of life.
- Recommending follow-ups with specialists when relevant.

Example:
**User**: I have diabetes and feel dizzy.
**Dr. MediMate**: Dizziness with diabetes could be related to blood sugar levels or other factors. Can you share your recent blood sugar readings and when you last ate? Check your blood sugar now, and if it’s low, consume 15g of fast-acting carbs like juice. Please contact your doctor within 48 hours for a thorough exam, as they may need to adjust your treatment.
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientType {
    #[default]
    Standard,
    Pediatric,
    Chronic,
}

impl PatientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientType::Standard => "standard",
            PatientType::Pediatric => "pediatric",
            PatientType::Chronic => "chronic",
        }
    }
}

impl fmt::Display for PatientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatientType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(PatientType::Standard),
            "pediatric" => Ok(PatientType::Pediatric),
            "chronic" => Ok(PatientType::Chronic),
            other => Err(format!("Unknown patient type: '{}'", other)),
        }
    }
}

/// One of the four fixed system prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    Standard,
    Pediatric,
    Chronic,
    Emergency,
}

impl PromptVariant {
    pub fn text(&self) -> String {
        match self {
            PromptVariant::Standard => BASE_PROMPT.to_string(),
            PromptVariant::Pediatric => [BASE_PROMPT, PEDIATRIC_ADDENDUM].concat(),
            PromptVariant::Chronic => [BASE_PROMPT, CHRONIC_ADDENDUM].concat(),
            PromptVariant::Emergency => [BASE_PROMPT, EMERGENCY_ADDENDUM].concat(),
        }
    }

    fn for_patient(patient_type: PatientType) -> Self {
        match patient_type {
            PatientType::Standard => PromptVariant::Standard,
            PatientType::Pediatric => PromptVariant::Pediatric,
            PatientType::Chronic => PromptVariant::Chronic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptSelection {
    pub is_emergency: bool,
    pub patient_type: PatientType,
    pub variant: PromptVariant,
}

#[derive(Debug, Clone, Copy)]
pub struct PromptSelector {
    emergency_detection: bool,
}

impl PromptSelector {
    pub fn new(emergency_detection: bool) -> Self {
        Self { emergency_detection }
    }

    /// Always false when emergency detection is switched off.
    pub fn detect_emergency(&self, message: &str) -> bool {
        self.emergency_detection && contains_any(message, EMERGENCY_KEYWORDS)
    }

    /// `requested` of `None` or `"auto"` triggers keyword inference. Any other
    /// value is taken as-is; unrecognised values fall back to standard.
    pub fn select(&self, message: &str, requested: Option<&str>) -> PromptSelection {
        let is_emergency = self.detect_emergency(message);
        let patient_type = match requested.map(str::trim) {
            None | Some("") => infer_patient_type(message),
            Some(r) if r.eq_ignore_ascii_case("auto") => infer_patient_type(message),
            Some(r) => r.parse().unwrap_or_else(|e| {
                warn!("{}, using standard prompt", e);
                PatientType::Standard
            }),
        };
        let variant = if is_emergency {
            PromptVariant::Emergency
        } else {
            PromptVariant::for_patient(patient_type)
        };

        info!("Selected prompt: {}, Emergency: {}", patient_type, is_emergency);
        PromptSelection { is_emergency, patient_type, variant }
    }
}

/// Pediatric keywords are checked before chronic ones; first match wins.
pub fn infer_patient_type(message: &str) -> PatientType {
    if contains_any(message, PEDIATRIC_KEYWORDS) {
        PatientType::Pediatric
    } else if contains_any(message, CHRONIC_KEYWORDS) {
        PatientType::Chronic
    } else {
        PatientType::Standard
    }
}

fn contains_any(message: &str, keywords: &[&str]) -> bool {
    let lowered = message.to_lowercase();
    keywords.iter().any(|k| lowered.contains(k))
}
