//! Template store
//!
//! Templates are kept in registration (source) order; `apply` walks the
//! selector result and hands each node to the first template whose pattern
//! matches. Guard evaluation and body evaluation stay in the evaluator;
//! this module only owns ordering and candidate selection.

use crate::parser::ast::TemplateDef;
use crate::udm::Udm;

use super::pattern::template_matches;

pub struct TemplateEngine<'p> {
    templates: &'p [TemplateDef],
}

impl<'p> TemplateEngine<'p> {
    pub fn new(templates: &'p [TemplateDef]) -> Self {
        TemplateEngine { templates }
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Candidate templates for a node, in source order, each with the
    /// bindings its pattern produced. The evaluator takes the first whose
    /// guard (if any) holds.
    pub fn candidates<'a>(
        &'a self,
        node: &'a Udm,
    ) -> impl Iterator<Item = (&'p TemplateDef, Vec<(String, Udm)>)> + 'a {
        self.templates
            .iter()
            .filter_map(move |template| {
                template_matches(&template.pattern, node).map(|bindings| (template, bindings))
            })
    }
}
