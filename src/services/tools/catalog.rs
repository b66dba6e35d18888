//! Declarative catalogue of the MCP tools this server exposes.
//!
//! Each entry names its parameters and the action that implements it; input
//! schemas for `tools/list` are generated from the same table that drives
//! argument validation, so the two cannot drift apart.

use crate::models::ToolDefinition;
use serde_json::{Map, Value, json};

/// JSON type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    /// Non-negative integer such as a page size
    Count,
    Boolean,
}

impl ParamKind {
    pub fn json_type(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer | ParamKind::Count => "integer",
            ParamKind::Boolean => "boolean",
        }
    }
}

/// Value used when the caller omits a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    /// Must be supplied
    Required,
    /// Optional, absent means "do not filter"
    Null,
    Integer(i64),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: ParamDefault,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn is_required(&self) -> bool {
        self.default == ParamDefault::Required
    }

    fn schema(&self) -> Value {
        let title = title_case(self.name);
        match self.default {
            ParamDefault::Required => json!({
                "type": self.kind.json_type(),
                "title": title,
                "description": self.description,
            }),
            ParamDefault::Null => json!({
                "anyOf": [{"type": self.kind.json_type()}, {"type": "null"}],
                "default": null,
                "title": title,
                "description": self.description,
            }),
            ParamDefault::Integer(n) => json!({
                "type": self.kind.json_type(),
                "default": n,
                "title": title,
                "description": self.description,
            }),
            ParamDefault::Boolean(b) => json!({
                "type": self.kind.json_type(),
                "default": b,
                "title": title,
                "description": self.description,
            }),
        }
    }
}

/// What a search tool hands back to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutput {
    /// The raw search `Bundle`
    Bundle,
    /// `Bundle.entry[].resource`
    Resources,
    /// One summary line per patient
    PatientSummaries,
}

/// Implementation behind a tool name
#[derive(Debug, Clone, Copy)]
pub enum ToolAction {
    /// `GET <resource_type>?_count=..&<filters>`; filters map argument name to search parameter
    Search {
        resource_type: &'static str,
        filters: &'static [(&'static str, &'static str)],
        output: SearchOutput,
    },
    /// `GET <resource_type>/<id>` returning the resource
    Read {
        resource_type: &'static str,
        id_param: &'static str,
    },
    /// `GET Patient/<id>` rendered as a summary line
    PatientSummary,
    Capabilities,
    PatientsWithConditions,
    DocumentContent,
    MedicineSearch,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    pub action: ToolAction,
}

impl ToolSpec {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in self.params {
            properties.insert(param.name.to_string(), param.schema());
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "title": format!("{}Arguments", self.name),
        })
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// `clinical_status` -> `Clinical Status`
fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

const fn optional(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::String,
        default: ParamDefault::Null,
        description,
    }
}

const fn required(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::String,
        default: ParamDefault::Required,
        description,
    }
}

const fn integer(name: &'static str, default: i64, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Integer,
        default: ParamDefault::Integer(default),
        description,
    }
}

const fn count(name: &'static str, default: i64, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Count,
        default: ParamDefault::Integer(default),
        description,
    }
}

const fn boolean(name: &'static str, default: bool, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Boolean,
        default: ParamDefault::Boolean(default),
        description,
    }
}

const COUNT: ParamSpec = count(
    "count",
    10,
    "The maximum number of results to return (default is 10).",
);

const PATIENT: ParamSpec = optional("patient", "The ID of the patient to filter by.");

const PATIENT_SEARCH: &[ParamSpec] = &[
    optional("name", "The patient's given name to search for."),
    optional("family", "The patient's family name to search for."),
    COUNT,
];

const PRACTITIONER_SEARCH: &[ParamSpec] = &[
    optional("name", "The practitioner's given name to search for."),
    optional("family", "The practitioner's family name to search for."),
    COUNT,
];

const COUNT_ONLY: &[ParamSpec] = &[COUNT];

const PATIENT_AND_COUNT: &[ParamSpec] = &[PATIENT, COUNT];

const PATIENT_STATUS_COUNT: &[ParamSpec] = &[
    PATIENT,
    optional("status", "The status to filter by (e.g., 'active', 'finished')."),
    COUNT,
];

const PATIENT_STATUS_CATEGORY_COUNT: &[ParamSpec] = &[
    PATIENT,
    optional("status", "The status to filter by (e.g., 'final', 'active')."),
    optional("category", "The category to filter by (e.g., 'LAB', 'assess-plan')."),
    COUNT,
];

const NAME_FAMILY_FILTERS: &[(&str, &str)] = &[("name", "name"), ("family", "family")];
const PATIENT_FILTER: &[(&str, &str)] = &[("patient", "patient")];
const PATIENT_STATUS_FILTERS: &[(&str, &str)] = &[("patient", "patient"), ("status", "status")];
const PATIENT_STATUS_CATEGORY_FILTERS: &[(&str, &str)] = &[
    ("patient", "patient"),
    ("status", "status"),
    ("category", "category"),
];
const ORGANIZATION_FILTERS: &[(&str, &str)] = &[("name", "name"), ("identifier", "identifier")];
const COVERAGE_FILTERS: &[(&str, &str)] = &[("patient", "beneficiary"), ("status", "status")];
const INSURANCE_PLAN_FILTERS: &[(&str, &str)] = &[
    ("owned_by", "owned-by"),
    ("administered_by", "administered-by"),
    ("name", "name"),
];

/// Every tool the server advertises, in `tools/list` order
pub static TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "get_document_content",
        description: "Get the content of a PDF document from a DocumentReference resource.\n\n\
            Retrieves the DocumentReference, downloads the document its first attachment points to \
            and optionally extracts the PDF text. Returns title, content type, URL and size; with \
            extract_text the result also carries 'extracted_text' and 'page_count'.",
        params: &[
            required("document_reference_id", "The ID of the DocumentReference resource."),
            boolean(
                "extract_text",
                false,
                "If true, extracts and returns the text content from the PDF.",
            ),
        ],
        action: ToolAction::DocumentContent,
    },
    ToolSpec {
        name: "get_patient",
        description: "Get a specific patient by their ID.\n\n\
            Retrieves the FHIR Patient resource for a given patient ID and returns a one-line \
            summary with ID, name, date of birth and gender.",
        params: &[required("patient_id", "The logical ID of the patient to retrieve.")],
        action: ToolAction::PatientSummary,
    },
    ToolSpec {
        name: "search_patients",
        description: "Search for patients in the FHIR server.\n\n\
            Searches for patients by given name, family name, or both, returning one summary line per patient.",
        params: PATIENT_SEARCH,
        action: ToolAction::Search {
            resource_type: "Patient",
            filters: NAME_FAMILY_FILTERS,
            output: SearchOutput::PatientSummaries,
        },
    },
    ToolSpec {
        name: "search_all_patients",
        description: "Get all patients (no filters).\n\n\
            Retrieves patients from the FHIR server without applying any filters.",
        params: COUNT_ONLY,
        action: ToolAction::Search {
            resource_type: "Patient",
            filters: &[],
            output: SearchOutput::PatientSummaries,
        },
    },
    ToolSpec {
        name: "search_practitioners",
        description: "Search for practitioners (doctors) in the FHIR server.\n\n\
            Searches for practitioners by given name, family name, or both.",
        params: PRACTITIONER_SEARCH,
        action: ToolAction::Search {
            resource_type: "Practitioner",
            filters: NAME_FAMILY_FILTERS,
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "search_observations",
        description: "Search for observations.\n\n\
            Retrieves observation resources, optionally filtered by patient. Returns the search Bundle.",
        params: PATIENT_AND_COUNT,
        action: ToolAction::Search {
            resource_type: "Observation",
            filters: PATIENT_FILTER,
            output: SearchOutput::Bundle,
        },
    },
    ToolSpec {
        name: "get_capability_statement",
        description: "Get FHIR server capabilities.\n\n\
            Retrieves the server's CapabilityStatement, summarising the FHIR resources, \
            interactions, and operations it supports.",
        params: &[],
        action: ToolAction::Capabilities,
    },
    ToolSpec {
        name: "search_conditions",
        description: "Search for conditions/diagnoses (e.g., diabetes).\n\n\
            Searches clinical conditions, filtered by patient, condition code, and clinical status. \
            Returns the search Bundle.",
        params: &[
            PATIENT,
            optional("code", "A code representing the condition (e.g., from SNOMED CT)."),
            optional(
                "clinical_status",
                "The clinical status of the condition (e.g., 'active', 'inactive').",
            ),
            COUNT,
        ],
        action: ToolAction::Search {
            resource_type: "Condition",
            filters: &[
                ("patient", "patient"),
                ("code", "code"),
                ("clinical_status", "clinical-status"),
            ],
            output: SearchOutput::Bundle,
        },
    },
    ToolSpec {
        name: "search_medication_requests",
        description: "Search for medication requests/prescriptions (e.g., diabetes medications).\n\n\
            Searches medication requests, filtered by patient, status, and intent. Returns the search Bundle.",
        params: &[
            PATIENT,
            optional(
                "status",
                "The status of the medication request (e.g., 'active', 'completed').",
            ),
            optional("intent", "The intent of the request (e.g., 'order', 'plan')."),
            COUNT,
        ],
        action: ToolAction::Search {
            resource_type: "MedicationRequest",
            filters: &[("patient", "patient"), ("status", "status"), ("intent", "intent")],
            output: SearchOutput::Bundle,
        },
    },
    ToolSpec {
        name: "search_diagnostic_reports",
        description: "Search for diagnostic reports (e.g., lab results, HbA1c tests).\n\n\
            Searches diagnostic reports, filtered by patient, status, and category. Returns the search Bundle.",
        params: PATIENT_STATUS_CATEGORY_COUNT,
        action: ToolAction::Search {
            resource_type: "DiagnosticReport",
            filters: PATIENT_STATUS_CATEGORY_FILTERS,
            output: SearchOutput::Bundle,
        },
    },
    ToolSpec {
        name: "search_care_plans",
        description: "Search for care plans (e.g., diabetes management plans).\n\n\
            Searches patient care plans, filtered by patient, status, and category. Returns the search Bundle.",
        params: PATIENT_STATUS_CATEGORY_COUNT,
        action: ToolAction::Search {
            resource_type: "CarePlan",
            filters: PATIENT_STATUS_CATEGORY_FILTERS,
            output: SearchOutput::Bundle,
        },
    },
    ToolSpec {
        name: "search_document_references",
        description: "Search for document references (e.g., clinical documents, reports).\n\n\
            Searches references to clinical documents, filtered by patient, status, and document \
            type. Returns the search Bundle.",
        params: &[
            PATIENT,
            optional(
                "status",
                "The status of the document reference (e.g., 'current', 'superseded').",
            ),
            optional(
                "type",
                "The type of the document (e.g., '11506-3' for 'Consultation note').",
            ),
            COUNT,
        ],
        action: ToolAction::Search {
            resource_type: "DocumentReference",
            filters: &[("patient", "patient"), ("status", "status"), ("type", "type")],
            output: SearchOutput::Bundle,
        },
    },
    ToolSpec {
        name: "find_patients_with_conditions",
        description: "Find unique patient IDs from condition records.\n\n\
            Useful for discovering patients who have a specific condition even when their Patient \
            records are not directly accessible. Returns a sorted list of unique patient IDs.",
        params: &[
            optional("code", "The condition code to search for (e.g., from SNOMED CT)."),
            count(
                "count",
                100,
                "The maximum number of condition records to inspect (default is 100).",
            ),
        ],
        action: ToolAction::PatientsWithConditions,
    },
    ToolSpec {
        name: "search_medicines",
        description: "Search for medicines and get their information (price, active ingredients) \
            from the Vezeeta pharmacy database based on medicine name.",
        params: &[
            required("medicine_name", "The medicine name to search for."),
            integer("from_index", 1, "Index of the first result (default is 1)."),
            count("size", 30, "Number of results to return (default is 30)."),
            boolean("is_trending", false, "Only return trending products."),
            integer("pharmacy_type_id", 0, "Pharmacy type filter (default is 0)."),
        ],
        action: ToolAction::MedicineSearch,
    },
    ToolSpec {
        name: "search_organizations",
        description: "Search for organizations in the FHIR server.\n\n\
            Searches healthcare organizations, filtered by name or identifier.",
        params: &[
            optional("name", "The name of the organization to search for."),
            optional("identifier", "A unique identifier for the organization."),
            COUNT,
        ],
        action: ToolAction::Search {
            resource_type: "Organization",
            filters: ORGANIZATION_FILTERS,
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "search_all_organizations",
        description: "Get all organizations (no filters).\n\n\
            Retrieves organization resources from the FHIR server without applying any filters.",
        params: COUNT_ONLY,
        action: ToolAction::Search {
            resource_type: "Organization",
            filters: &[],
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "search_coverages",
        description: "Search for coverage/insurance resources in the FHIR server.\n\n\
            Searches patient coverage information, filtered by patient (beneficiary) or status.",
        params: &[
            optional("patient", "The ID of the patient (beneficiary) to search for coverage."),
            optional("status", "The status of the coverage (e.g., 'active', 'cancelled')."),
            COUNT,
        ],
        action: ToolAction::Search {
            resource_type: "Coverage",
            filters: COVERAGE_FILTERS,
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "search_all_coverages",
        description: "Get all coverage/insurance resources (no filters).\n\n\
            Retrieves coverage resources from the FHIR server without applying any filters.",
        params: COUNT_ONLY,
        action: ToolAction::Search {
            resource_type: "Coverage",
            filters: &[],
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "get_insurance_plan",
        description: "Get a specific insurance plan by its ID.\n\n\
            Retrieves the FHIR InsurancePlan resource: who offers the plan, what the coverage is, \
            the provider network, and costs.",
        params: &[required(
            "insurance_plan_id",
            "The logical ID of the insurance plan to retrieve.",
        )],
        action: ToolAction::Read {
            resource_type: "InsurancePlan",
            id_param: "insurance_plan_id",
        },
    },
    ToolSpec {
        name: "search_insurance_plans",
        description: "Search for insurance plans (e.g., specific health insurance products).\n\n\
            Searches insurance plans, filtered by owning organization, administering organization, \
            and plan name.",
        params: &[
            optional("owned_by", "The organization that owns the insurance plan."),
            optional(
                "administered_by",
                "The organization that administers the insurance plan.",
            ),
            optional("name", "The name of the insurance plan."),
            COUNT,
        ],
        action: ToolAction::Search {
            resource_type: "InsurancePlan",
            filters: INSURANCE_PLAN_FILTERS,
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "search_all_insurance_plans",
        description: "Get all insurance plans (no filters).\n\n\
            Retrieves insurance plan resources from the FHIR server without applying any filters.",
        params: COUNT_ONLY,
        action: ToolAction::Search {
            resource_type: "InsurancePlan",
            filters: &[],
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "search_encounters",
        description: "Search for encounters (e.g., hospital visits, appointments).\n\n\
            Searches patient encounters, filtered by patient or encounter status.",
        params: PATIENT_STATUS_COUNT,
        action: ToolAction::Search {
            resource_type: "Encounter",
            filters: PATIENT_STATUS_FILTERS,
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "search_all_encounters",
        description: "Get all encounters (no filters).\n\n\
            Retrieves encounter resources from the FHIR server without applying any filters.",
        params: COUNT_ONLY,
        action: ToolAction::Search {
            resource_type: "Encounter",
            filters: &[],
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "search_allergy_intolerances",
        description: "Search for allergy intolerances.\n\n\
            Searches allergy and intolerance records, optionally for a specific patient.",
        params: PATIENT_AND_COUNT,
        action: ToolAction::Search {
            resource_type: "AllergyIntolerance",
            filters: PATIENT_FILTER,
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "search_all_allergy_intolerances",
        description: "Get all allergy intolerances (no filters).\n\n\
            Retrieves allergy intolerance resources from the FHIR server without applying any filters.",
        params: COUNT_ONLY,
        action: ToolAction::Search {
            resource_type: "AllergyIntolerance",
            filters: &[],
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "search_procedures",
        description: "Search for procedures.\n\n\
            Searches clinical procedures, optionally for a specific patient.",
        params: PATIENT_AND_COUNT,
        action: ToolAction::Search {
            resource_type: "Procedure",
            filters: PATIENT_FILTER,
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "search_all_procedures",
        description: "Get all procedures (no filters).\n\n\
            Retrieves procedure resources from the FHIR server without applying any filters.",
        params: COUNT_ONLY,
        action: ToolAction::Search {
            resource_type: "Procedure",
            filters: &[],
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "search_immunizations",
        description: "Search for immunization records.\n\n\
            Searches immunization records, optionally for a specific patient.",
        params: PATIENT_AND_COUNT,
        action: ToolAction::Search {
            resource_type: "Immunization",
            filters: PATIENT_FILTER,
            output: SearchOutput::Resources,
        },
    },
    ToolSpec {
        name: "search_all_immunizations",
        description: "Get all immunization records (no filters).\n\n\
            Retrieves immunization resources from the FHIR server without applying any filters.",
        params: COUNT_ONLY,
        action: ToolAction::Search {
            resource_type: "Immunization",
            filters: &[],
            output: SearchOutput::Resources,
        },
    },
];

pub fn find_tool(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|tool| tool.name == name)
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    TOOLS.iter().map(ToolSpec::definition).collect()
}
