//! Fixed symptom and disease vocabularies used by the corpus generator and
//! the trainer's column validation.

/// Name of the label column in every corpus shard.
pub const LABEL_COLUMN: &str = "disease";

pub const SYMPTOMS: [&str; 44] = [
    "fever",
    "chills",
    "sweating",
    "cough",
    "sore_throat",
    "runny_nose",
    "nasal_congestion",
    "shortness_of_breath",
    "wheezing",
    "chest_pain",
    "fatigue",
    "weakness",
    "headache",
    "migraine_like_pain",
    "dizziness",
    "nausea",
    "vomiting",
    "diarrhea",
    "abdominal_pain",
    "loss_of_appetite",
    "body_pain",
    "joint_pain",
    "muscle_ache",
    "rash",
    "itching",
    "eye_redness",
    "loss_of_taste_or_smell",
    "urinary_frequency",
    "burning_urination",
    "bleeding",
    "sweeling_limbs",
    "back_pain",
    "constipation",
    "anxiety",
    "depression",
    "memory_loss",
    "sleep_disturbance",
    "blurred_vision",
    "ear_pain",
    "skin_peeling",
    "sensitivity_to_light",
    "dehydration",
    "palpitations",
    "chest_tightness",
];

pub const DISEASES: [&str; 32] = [
    "Flu",
    "Common Cold",
    "COVID-19",
    "Gastroenteritis",
    "Dengue",
    "Malaria",
    "Pneumonia",
    "Strep Throat",
    "Migraine",
    "Urinary Tract Infection",
    "Allergy",
    "Asthma",
    "Bronchitis",
    "Hypertension",
    "Diabetes",
    "Anemia",
    "Arthritis",
    "Chickenpox",
    "Measles",
    "Sinusitis",
    "Tuberculosis",
    "Tonsillitis",
    "Anxiety Disorder",
    "Depression",
    "Skin Infection",
    "Eye Infection",
    "Ear Infection",
    "Heart Disease",
    "Kidney Infection",
    "Food Poisoning",
    "Appendicitis",
    "Chronic Fatigue Syndrome",
];

/// Symptoms that are strongly and moderately associated with a disease.
///
/// Some entries name symptoms outside [`SYMPTOMS`] (e.g. `swelling`); the
/// generator never emits a column for them.
#[derive(Debug, Clone, Copy)]
pub struct DiseaseProfile {
    pub disease: &'static str,
    pub high: &'static [&'static str],
    pub mid: &'static [&'static str],
}

const PROFILES: [DiseaseProfile; 32] = [
    DiseaseProfile {
        disease: "Flu",
        high: &["fever", "cough", "fatigue", "headache", "body_pain"],
        mid: &["sore_throat", "chills", "sweating"],
    },
    DiseaseProfile {
        disease: "Common Cold",
        high: &["cough", "sore_throat", "runny_nose", "nasal_congestion"],
        mid: &["headache", "fatigue"],
    },
    DiseaseProfile {
        disease: "COVID-19",
        high: &[
            "fever",
            "cough",
            "fatigue",
            "loss_of_taste_or_smell",
            "shortness_of_breath",
        ],
        mid: &["headache", "sore_throat"],
    },
    DiseaseProfile {
        disease: "Gastroenteritis",
        high: &["nausea", "vomiting", "diarrhea", "abdominal_pain"],
        mid: &["loss_of_appetite", "weakness"],
    },
    DiseaseProfile {
        disease: "Dengue",
        high: &["fever", "body_pain", "headache", "rash"],
        mid: &["nausea", "weakness"],
    },
    DiseaseProfile {
        disease: "Malaria",
        high: &["fever", "chills", "sweating", "weakness"],
        mid: &["headache", "nausea"],
    },
    DiseaseProfile {
        disease: "Pneumonia",
        high: &["fever", "cough", "shortness_of_breath", "chest_pain"],
        mid: &["fatigue"],
    },
    DiseaseProfile {
        disease: "Strep Throat",
        high: &["sore_throat", "fever", "headache"],
        mid: &["loss_of_appetite"],
    },
    DiseaseProfile {
        disease: "Migraine",
        high: &["headache", "migraine_like_pain", "nausea", "dizziness"],
        mid: &[],
    },
    DiseaseProfile {
        disease: "Urinary Tract Infection",
        high: &["urinary_frequency", "burning_urination", "loss_of_appetite"],
        mid: &["fever"],
    },
    DiseaseProfile {
        disease: "Allergy",
        high: &["runny_nose", "nasal_congestion", "itching", "eye_redness"],
        mid: &["sore_throat"],
    },
    DiseaseProfile {
        disease: "Asthma",
        high: &["wheezing", "shortness_of_breath", "chest_tightness"],
        mid: &["cough", "fatigue"],
    },
    DiseaseProfile {
        disease: "Bronchitis",
        high: &["cough", "wheezing", "chest_pain"],
        mid: &["fatigue", "shortness_of_breath"],
    },
    DiseaseProfile {
        disease: "Hypertension",
        high: &["headache", "dizziness", "fatigue"],
        mid: &["chest_pain", "palpitations"],
    },
    DiseaseProfile {
        disease: "Diabetes",
        high: &["fatigue", "weakness", "frequent_urination"],
        mid: &["blurred_vision", "dehydration"],
    },
    DiseaseProfile {
        disease: "Anemia",
        high: &["fatigue", "weakness", "dizziness"],
        mid: &["pale_skin", "shortness_of_breath"],
    },
    DiseaseProfile {
        disease: "Arthritis",
        high: &["joint_pain", "swelling", "stiffness"],
        mid: &["fatigue", "body_pain"],
    },
    DiseaseProfile {
        disease: "Chickenpox",
        high: &["fever", "rash", "itching"],
        mid: &["fatigue"],
    },
    DiseaseProfile {
        disease: "Measles",
        high: &["rash", "fever", "runny_nose", "eye_redness"],
        mid: &["cough", "sore_throat"],
    },
    DiseaseProfile {
        disease: "Sinusitis",
        high: &["headache", "nasal_congestion", "facial_pain"],
        mid: &["fever", "fatigue"],
    },
    DiseaseProfile {
        disease: "Tuberculosis",
        high: &["cough", "fever", "weight_loss"],
        mid: &["fatigue", "night_sweats"],
    },
    DiseaseProfile {
        disease: "Tonsillitis",
        high: &["sore_throat", "fever", "difficulty_swallowing"],
        mid: &["fatigue"],
    },
    DiseaseProfile {
        disease: "Anxiety Disorder",
        high: &["anxiety", "palpitations", "sleep_disturbance"],
        mid: &["fatigue"],
    },
    DiseaseProfile {
        disease: "Depression",
        high: &["depression", "fatigue", "sleep_disturbance"],
        mid: &["loss_of_appetite"],
    },
    DiseaseProfile {
        disease: "Skin Infection",
        high: &["rash", "itching", "skin_peeling"],
        mid: &["fever"],
    },
    DiseaseProfile {
        disease: "Eye Infection",
        high: &["eye_redness", "itching", "blurred_vision"],
        mid: &["pain"],
    },
    DiseaseProfile {
        disease: "Ear Infection",
        high: &["ear_pain", "fever", "hearing_loss"],
        mid: &["headache"],
    },
    DiseaseProfile {
        disease: "Heart Disease",
        high: &["chest_pain", "palpitations", "shortness_of_breath"],
        mid: &["fatigue", "weakness"],
    },
    DiseaseProfile {
        disease: "Kidney Infection",
        high: &["fever", "back_pain", "burning_urination"],
        mid: &["nausea", "fatigue"],
    },
    DiseaseProfile {
        disease: "Food Poisoning",
        high: &["vomiting", "diarrhea", "abdominal_pain"],
        mid: &["fever", "weakness"],
    },
    DiseaseProfile {
        disease: "Appendicitis",
        high: &["abdominal_pain", "nausea", "fever"],
        mid: &["loss_of_appetite"],
    },
    DiseaseProfile {
        disease: "Chronic Fatigue Syndrome",
        high: &["fatigue", "muscle_ache", "sleep_disturbance"],
        mid: &["memory_loss", "weakness"],
    },
];

pub fn profiles() -> &'static [DiseaseProfile] {
    &PROFILES
}

pub fn profile(disease: &str) -> Option<&'static DiseaseProfile> {
    PROFILES.iter().find(|p| p.disease == disease)
}

pub fn symptom_index(name: &str) -> Option<usize> {
    SYMPTOMS.iter().position(|s| *s == name)
}

impl DiseaseProfile {
    /// Per-symptom positive probability over [`SYMPTOMS`].
    pub fn probabilities(&self, high: f64, mid: f64, base: f64) -> Vec<f64> {
        let mut probs = vec![base; SYMPTOMS.len()];
        for name in self.high {
            if let Some(idx) = symptom_index(name) {
                probs[idx] = high;
            }
        }
        for name in self.mid {
            if let Some(idx) = symptom_index(name) {
                probs[idx] = mid;
            }
        }
        probs
    }

    /// Indices of the two symptoms forced on when a draw under-produces.
    ///
    /// High-set symptoms come first; mid-set symptoms fill in when fewer than
    /// two high symptoms are part of the vocabulary.
    pub fn anchor_indices(&self) -> Vec<usize> {
        self.high
            .iter()
            .chain(self.mid.iter())
            .filter_map(|name| symptom_index(name))
            .take(2)
            .collect()
    }
}
