//! Engine-wide properties checked over generated attribute trees.

use quickcheck::{Arbitrary, Gen, QuickCheck};
use serde_json::{Map, Value};

use crate::{Preprocessor, Serializer, StateResource, TraitRegistry};

/// A generated attribute tree with identifier-safe keys and scalar
/// values drawn from a brace-free alphabet, so structural tokens in the
/// output can be counted textually.
#[derive(Debug, Clone)]
struct Tree(Value);

const LETTERS: &[char] = &['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];

fn ident(g: &mut Gen) -> String {
    let len = 1 + usize::arbitrary(g) % 6;
    (0..len)
        .map(|_| *g.choose(LETTERS).unwrap_or(&'a'))
        .collect()
}

fn scalar(g: &mut Gen) -> Value {
    match u8::arbitrary(g) % 4 {
        0 => Value::Null,
        1 => Value::Bool(bool::arbitrary(g)),
        2 => Value::from(i64::from(u8::arbitrary(g))),
        _ => Value::String(ident(g)),
    }
}

fn value(g: &mut Gen, depth: u8) -> Value {
    if depth == 0 {
        return scalar(g);
    }
    match u8::arbitrary(g) % 6 {
        0 | 1 | 2 => scalar(g),
        3 => {
            let len = usize::arbitrary(g) % 3;
            Value::Array((0..len).map(|_| value(g, depth - 1)).collect())
        }
        _ => {
            let len = usize::arbitrary(g) % 3;
            let mut map = Map::new();
            for _ in 0..len {
                map.insert(ident(g), value(g, depth - 1));
            }
            Value::Object(map)
        }
    }
}

impl Arbitrary for Tree {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::arbitrary(g) % 6;
        let mut map = Map::new();
        for _ in 0..len {
            map.insert(ident(g), value(g, 3));
        }
        Tree(Value::Object(map))
    }
}

/// Every emitted resource closes every brace and bracket it opens.
#[test]
fn output_structural_tokens_balance() {
    fn prop(tree: Tree) -> bool {
        let registry = TraitRegistry::default();
        let resource = match StateResource::new("example_resource", "main", tree.0) {
            Ok(r) => r,
            Err(_) => return false,
        };
        let Ok(out) = Serializer::new(&registry).serialize(&resource) else {
            return false;
        };
        let count = |c: char| out.chars().filter(|&x| x == c).count();
        count('{') == count('}') && count('[') == count(']')
    }
    QuickCheck::new()
        .tests(500)
        .quickcheck(prop as fn(Tree) -> bool);
}

/// Preprocessing twice deletes nothing on the second run.
#[test]
fn preprocessing_is_idempotent() {
    fn prop(tree: Tree) -> bool {
        let registry = TraitRegistry::default();
        let traits = registry.traits_for("example_resource");
        let resource = match StateResource::new("example_resource", "main", tree.0) {
            Ok(r) => r,
            Err(_) => return false,
        };
        let serializer = Serializer::new(&registry);
        let Ok(mut queue) = serializer.build_queue(&resource, traits) else {
            return false;
        };
        let pre = Preprocessor::new(traits);
        if pre.run(&mut queue).is_err() {
            return false;
        }
        let after_first = queue.len();
        if pre.run(&mut queue).is_err() {
            return false;
        }
        queue.len() == after_first
    }
    QuickCheck::new()
        .tests(500)
        .quickcheck(prop as fn(Tree) -> bool);
}

/// Serializing the same tree twice produces identical text.
#[test]
fn serialization_is_deterministic() {
    fn prop(tree: Tree) -> bool {
        let registry = TraitRegistry::default();
        let resource = match StateResource::new("example_resource", "main", tree.0) {
            Ok(r) => r,
            Err(_) => return false,
        };
        let serializer = Serializer::new(&registry);
        serializer.serialize(&resource).ok() == serializer.serialize(&resource).ok()
    }
    QuickCheck::new()
        .tests(200)
        .quickcheck(prop as fn(Tree) -> bool);
}
