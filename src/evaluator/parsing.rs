use crate::ast::{Component, Formula, Parenthesis};
use crate::error::SyntaxError;
use crate::operators::Operator;
use itertools::Itertools;

/// A component sequence with its parentheses matched into nested groups.
#[derive(Debug, Clone, PartialEq)]
pub enum Node<'a> {
    /// A `variable` or `value` component.
    Operand(&'a Component),
    Operator(Operator),
    Group(Vec<Node<'a>>),
}

/// Sorts the formula's components by `order` and matches `OPEN`/`CLOSE`
/// pairs into a tree, failing on the first mismatch.
pub fn parse(formula: &Formula) -> Result<Vec<Node<'_>>, SyntaxError> {
    parse_components(&formula.components)
}

pub fn parse_components(components: &[Component]) -> Result<Vec<Node<'_>>, SyntaxError> {
    if components.is_empty() {
        return Err(SyntaxError::Empty);
    }

    let sorted: Vec<&Component> = components.iter().sorted_by_key(|c| c.order()).collect();
    if let Some((a, _)) = sorted
        .iter()
        .tuple_windows()
        .find(|(a, b)| a.order() == b.order())
    {
        return Err(SyntaxError::DuplicateOrder { order: a.order() });
    }

    // Each open group keeps the order of its `OPEN` for error reporting.
    let mut stack: Vec<(u32, Vec<Node>)> = vec![(0, Vec::new())];
    for component in sorted {
        match component {
            Component::Parenthesis {
                order,
                value: Parenthesis::Open,
            } => stack.push((*order, Vec::new())),
            Component::Parenthesis {
                order,
                value: Parenthesis::Close,
            } => {
                if stack.len() == 1 {
                    return Err(SyntaxError::UnmatchedClose { order: *order });
                }
                if let Some((_, group)) = stack.pop() {
                    push_node(&mut stack, Node::Group(group));
                }
            }
            Component::Operator { value, .. } => push_node(&mut stack, Node::Operator(*value)),
            Component::Variable { .. } | Component::Value { .. } => {
                push_node(&mut stack, Node::Operand(component))
            }
        }
    }

    if stack.len() > 1 {
        let (order, _) = stack[stack.len() - 1];
        return Err(SyntaxError::UnterminatedGroup { order });
    }
    Ok(stack.pop().map(|(_, root)| root).unwrap_or_default())
}

fn push_node<'a>(stack: &mut [(u32, Vec<Node<'a>>)], node: Node<'a>) {
    if let Some((_, top)) = stack.last_mut() {
        top.push(node);
    }
}

/// Maximum parenthesis nesting of a parsed sequence.
pub fn depth(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            Node::Group(children) => 1 + depth(children),
            _ => 0,
        })
        .max()
        .unwrap_or(0)
}
