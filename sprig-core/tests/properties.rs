use proptest::prelude::*;
use sprig_core::{Allocation, Attributes, Config, Element, Handle, Manipulator, RemovalPolicy, Search};
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    /// Add under the n-th live handle (modulo the live count)
    Add(usize, String),
    /// Remove the n-th live non-root handle
    Remove(usize),
}

fn tag() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}"
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (any::<usize>(), tag()).prop_map(|(i, t)| Op::Add(i, t)),
        1 => any::<usize>().prop_map(Op::Remove),
    ]
}

fn element() -> impl Strategy<Value = Element> {
    let leaf = (tag(), "[a-zA-Z0-9 <>&\"']{0,12}", prop::collection::vec((tag(), "[a-z0-9&<\"]{0,5}"), 0..3))
        .prop_map(|(tag, text, attrs)| Element {
            tag,
            text: text.trim().to_string(),
            attributes: attrs.into_iter().collect::<Attributes>(),
            children: Vec::new(),
        });
    leaf.prop_recursive(3, 24, 4, |inner| {
        (inner.clone(), prop::collection::vec(inner, 0..4)).prop_map(|(mut parent, children)| {
            parent.children = children;
            parent
        })
    })
}

fn sorted_live(doc: &Manipulator) -> Vec<Handle> {
    let mut handles: Vec<_> = doc.handles().collect();
    handles.sort();
    handles
}

fn run_ops(config: Config, ops: Vec<Op>) {
    let mut doc = Manipulator::from_element_with_config(Element::new("root"), config).unwrap();
    let mut issued = HashSet::new();

    for op in ops {
        let live = sorted_live(&doc);
        match op {
            Op::Add(i, tag) => {
                let parent = live[i % live.len()];
                let handle = doc.add(parent, &tag, "", Attributes::new()).unwrap();
                assert!(!handle.is_root());
                assert!(!live.contains(&handle), "handle {} reused while live", handle);
                issued.insert(handle);
            }
            Op::Remove(i) => {
                let removable: Vec<_> = live.into_iter().filter(|h| !h.is_root()).collect();
                if !removable.is_empty() {
                    doc.remove(removable[i % removable.len()]).unwrap();
                }
            }
        }
        assert_eq!(doc.get_element(Handle::ROOT).unwrap().tag(), "root");
        assert!(doc.get_element(Handle::ROOT).unwrap().is_root());
    }

    // Every registered handle resolves to a distinct element
    let mut seen = HashSet::new();
    for handle in doc.handles() {
        let element = doc.get_element(handle).unwrap();
        assert_eq!(element.handle(), Some(handle));
        assert!(seen.insert(handle));
    }
}

proptest! {
    #[test]
    fn prop_handles_unique_sequential_cascade(ops in prop::collection::vec(op(), 0..60)) {
        run_ops(Config::default(), ops);
    }

    #[test]
    fn prop_handles_unique_random_detach(ops in prop::collection::vec(op(), 0..60)) {
        let config = Config::default()
            .with_allocation(Allocation::Random)
            .with_removal(RemovalPolicy::Detach);
        run_ops(config, ops);
    }

    #[test]
    fn prop_round_trip(root in element()) {
        let doc = Manipulator::from_element(root.clone()).unwrap();
        prop_assert_eq!(Element::parse(&doc.get_string(true)).unwrap(), root.clone());
        prop_assert_eq!(Element::parse(&doc.get_string(false)).unwrap(), root);
    }

    #[test]
    fn prop_unique_element_is_found(root in element()) {
        let doc = Manipulator::from_element(root.clone()).unwrap();
        for element in root.iter() {
            let same = root
                .iter()
                .filter(|e| e.tag == element.tag && e.attributes == element.attributes)
                .count();
            if same == 1 {
                let search = Search::tag(element.tag.clone()).attributes(element.attributes.clone());
                let found = doc.get_element(doc.get_id(&search).unwrap()).unwrap();
                prop_assert_eq!(found.tag(), element.tag.as_str());
                prop_assert_eq!(found.attributes(), &element.attributes);
            }
        }
    }
}
