//! Schema view over the dataset.
//!
//! Precomputes the `rdfs:domain` / `rdfs:range` declarations and the
//! parent-to-children `rdfs:subClassOf` map once at load, then answers the
//! three probes the type inferencer needs. The subclass closure is a
//! worklist fixed point with a visited set, so cyclic hierarchies cannot
//! loop.
//!
//! Empty answers are meaningful: an empty domain means the schema places
//! no constraint on the predicate's subjects, not that nothing is allowed.

use std::collections::VecDeque;

use graphveil_core::Iri;
use graphveil_vocab::rdfs;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::store::Graph;

/// Precomputed schema maps.
#[derive(Debug, Default)]
pub struct SchemaView {
    /// Predicate -> declared rdfs:domain classes
    domains: FxHashMap<Iri, Vec<Iri>>,
    /// Predicate -> declared rdfs:range classes
    ranges: FxHashMap<Iri, Vec<Iri>>,
    /// Class -> direct subclasses (children)
    subclass_children: FxHashMap<Iri, Vec<Iri>>,
}

impl SchemaView {
    /// Build a schema view from the loaded graph.
    pub fn from_graph(graph: &Graph) -> Self {
        let mut view = SchemaView::default();
        let domain = Iri::new(rdfs::DOMAIN);
        let range = Iri::new(rdfs::RANGE);
        let sub_class_of = Iri::new(rdfs::SUB_CLASS_OF);

        for triple in graph.triples() {
            let (Some(subject), Some(object)) = (triple.subject.as_iri(), triple.object.as_iri())
            else {
                continue;
            };

            if triple.predicate == domain {
                view.domains
                    .entry(subject.clone())
                    .or_default()
                    .push(object.clone());
            } else if triple.predicate == range {
                view.ranges
                    .entry(subject.clone())
                    .or_default()
                    .push(object.clone());
            } else if triple.predicate == sub_class_of {
                // (child, rdfs:subClassOf, parent) inverts to parent -> child
                view.subclass_children
                    .entry(object.clone())
                    .or_default()
                    .push(subject.clone());
            }
        }

        view
    }

    /// Classes a subject of `predicate` may belong to: the declared domain
    /// classes plus all their transitive subclasses. Empty when the schema
    /// declares no domain.
    pub fn domain(&self, predicate: &Iri) -> Vec<Iri> {
        self.with_subclasses(self.domains.get(predicate))
    }

    /// Classes an object of `predicate` may belong to: the declared range
    /// classes plus all their transitive subclasses. Empty when the schema
    /// declares no range.
    pub fn range(&self, predicate: &Iri) -> Vec<Iri> {
        self.with_subclasses(self.ranges.get(predicate))
    }

    fn with_subclasses(&self, declared: Option<&Vec<Iri>>) -> Vec<Iri> {
        let Some(declared) = declared else {
            return Vec::new();
        };
        let mut result = declared.clone();
        result.extend(self.sub_classes_of(declared));
        result
    }

    /// Transitive subclasses of the given classes, excluding the classes
    /// themselves, in breadth-first discovery order.
    pub fn sub_classes_of(&self, classes: &[Iri]) -> Vec<Iri> {
        let mut result = Vec::new();
        let mut visited: FxHashSet<&Iri> = classes.iter().collect();
        let mut queue: VecDeque<&Iri> = classes.iter().collect();

        while let Some(class) = queue.pop_front() {
            if let Some(children) = self.subclass_children.get(class) {
                for child in children {
                    if visited.insert(child) {
                        result.push(child.clone());
                        queue.push_back(child);
                    }
                }
            }
        }

        result
    }
}
