//! Message personalization — literal `{placeholder}` substitution.
//!
//! Substitution runs against a fixed attribute set plus the lead's custom
//! attributes. Unknown placeholders are left verbatim so a typo'd template
//! degrades the copy, not the delivery.

use std::collections::BTreeMap;

use crate::leads::Lead;
use crate::templates::MessageTemplate;

/// A rendered message ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub body: String,
}

/// Fills template placeholders with lead attributes.
pub struct Personalizer {
    /// Substituted as `{our_name}`.
    business_name: String,
}

impl Personalizer {
    pub fn new(business_name: &str) -> Self {
        Self {
            business_name: business_name.to_string(),
        }
    }

    /// Render a template for a lead.
    pub fn render(&self, template: &MessageTemplate, lead: &Lead) -> Rendered {
        let variables = self.variables(lead);
        Rendered {
            subject: substitute(&template.subject, &variables),
            body: substitute(&template.body, &variables),
        }
    }

    fn variables(&self, lead: &Lead) -> BTreeMap<String, String> {
        let mut variables = BTreeMap::new();
        variables.insert("first_name".to_string(), lead.first_name.clone());
        variables.insert("last_name".to_string(), lead.last_name.clone());
        variables.insert("full_name".to_string(), lead.full_name());
        variables.insert("email".to_string(), lead.email.clone());
        variables.insert("company_name".to_string(), lead.company_name.clone());
        variables.insert(
            "job_title".to_string(),
            lead.job_title.clone().unwrap_or_default(),
        );
        variables.insert(
            "industry".to_string(),
            lead.industry.clone().unwrap_or_default(),
        );
        variables.insert(
            "company_size".to_string(),
            lead.company_size.clone().unwrap_or_default(),
        );
        variables.insert("phone".to_string(), lead.phone.clone().unwrap_or_default());
        variables.insert(
            "website".to_string(),
            lead.website.clone().unwrap_or_default(),
        );
        variables.insert("our_name".to_string(), self.business_name.clone());

        for (key, value) in &lead.custom_attributes {
            variables.insert(key.clone(), value.clone());
        }

        variables
    }
}

fn substitute(text: &str, variables: &BTreeMap<String, String>) -> String {
    let mut result = text.to_string();
    for (name, value) in variables {
        let placeholder = format!("{{{name}}}");
        if result.contains(&placeholder) {
            result = result.replace(&placeholder, value);
        }
    }
    result
}
