//! Service catalog
//!
//! Fixed set of offered services, each with its checklist of required
//! document keys. The checklist is snapshotted onto a submission at creation
//! time, so later catalog edits never change existing tickets.

/// One entry of a service's document checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDoc {
    pub key: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceDef {
    pub key: &'static str,
    pub name: &'static str,
    pub required_docs: &'static [ServiceDoc],
}

pub const SERVICES: &[ServiceDef] = &[
    ServiceDef {
        key: "individual_1040",
        name: "Individual Tax Filing (Form 1040)",
        required_docs: &[
            ServiceDoc {
                key: "identity",
                label: "Photo ID (Passport / Driver's License)",
            },
            ServiceDoc {
                key: "w2",
                label: "W-2 (if applicable)",
            },
            ServiceDoc {
                key: "1099",
                label: "1099s (1099-NEC/INT/DIV/etc.)",
            },
            ServiceDoc {
                key: "prior_return",
                label: "Prior-year tax return (if available)",
            },
        ],
    },
    ServiceDef {
        key: "itin",
        name: "ITIN Application",
        required_docs: &[
            ServiceDoc {
                key: "passport",
                label: "Passport / National ID",
            },
            ServiceDoc {
                key: "itin_support",
                label: "Supporting documents (as applicable)",
            },
        ],
    },
    ServiceDef {
        key: "fbar_fatca",
        name: "FBAR / FATCA",
        required_docs: &[
            ServiceDoc {
                key: "bank_statements",
                label: "Bank statements / account details",
            },
            ServiceDoc {
                key: "account_summary",
                label: "Account summary (highest balance)",
            },
        ],
    },
    ServiceDef {
        key: "business",
        name: "Business Tax Filing",
        required_docs: &[
            ServiceDoc {
                key: "ein_letter",
                label: "EIN confirmation letter (if available)",
            },
            ServiceDoc {
                key: "financials",
                label: "Financial statements / books",
            },
            ServiceDoc {
                key: "payroll",
                label: "Payroll reports (if applicable)",
            },
        ],
    },
    ServiceDef {
        key: "amendment",
        name: "Tax Return Amendment",
        required_docs: &[
            ServiceDoc {
                key: "original_return",
                label: "Original filed return",
            },
            ServiceDoc {
                key: "amendment_reason",
                label: "Documents supporting the amendment",
            },
        ],
    },
];

pub fn get_service_by_key(key: &str) -> Option<&'static ServiceDef> {
    SERVICES.iter().find(|s| s.key == key)
}

impl ServiceDef {
    /// Checklist keys, in catalog order, for the creation-time snapshot
    pub fn required_doc_keys(&self) -> Vec<String> {
        self.required_docs.iter().map(|d| d.key.to_string()).collect()
    }

    pub fn has_doc_key(&self, key: &str) -> bool {
        self.required_docs.iter().any(|d| d.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_key() {
        assert!(get_service_by_key("individual_1040").is_some());
        assert!(get_service_by_key("itin").is_some());
        assert!(get_service_by_key("crypto_wizardry").is_none());
    }

    #[test]
    fn individual_1040_checklist() {
        let service = get_service_by_key("individual_1040").unwrap();
        assert_eq!(
            service.required_doc_keys(),
            vec!["identity", "w2", "1099", "prior_return"]
        );
    }

    #[test]
    fn doc_key_membership() {
        let service = get_service_by_key("business").unwrap();
        assert!(service.has_doc_key("payroll"));
        assert!(!service.has_doc_key("w2"));
    }

    #[test]
    fn keys_unique_across_catalog() {
        let mut keys: Vec<_> = SERVICES.iter().map(|s| s.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), SERVICES.len());
    }
}
