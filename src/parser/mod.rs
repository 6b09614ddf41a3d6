//! # Parser Module
//!
//! @title Function Segmentation for C and C++ Sources
//! @author Ramprasad
//!
//! This module carves a source file into function-sized units that detection
//! models can score independently. It uses tree-sitter to obtain a concrete
//! syntax tree and walks it to a bounded depth, collecting every function
//! definition (including function-like preprocessor macros).
//!
//! ## Key Types
//!
//! - [`Segmenter`] - Bounded-depth function extractor
//! - [`FunctionUnit`] - One function with its inclusive, 0-based line range
//! - [`Language`] - Grammar selected from a file extension hint

mod language;

pub use language::Language;

use crate::error::{ImdbugError, Result};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use tree_sitter::{Node, Parser, Tree};

/// Node kinds that count as a function definition in both grammars.
const FUNCTION_NODE_KINDS: &[&str] = &["function_definition", "preproc_function_def"];

/// Default traversal depth: the root's children plus seven nested levels.
///
/// Deep enough for functions inside namespaces, classes, `extern "C"` blocks,
/// templates and `#ifdef` groups.
pub const DEFAULT_MAX_DEPTH: usize = 8;

thread_local! {
    static PARSERS: RefCell<HashMap<Language, Parser>> = RefCell::new(HashMap::new());
}

/// A contiguous line range of source text holding one function definition.
///
/// `start_line` and `end_line` are 0-based and inclusive, aligned with the
/// lines of the original file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionUnit {
    /// The exact source lines of the function, line terminators included.
    pub text: String,

    /// First line of the function (0-based).
    pub start_line: usize,

    /// Last line of the function (0-based, inclusive).
    pub end_line: usize,
}

impl FunctionUnit {
    /// Number of source lines covered by the unit.
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    /// Returns `true` if the absolute line index lies inside the unit.
    pub fn contains_line(&self, line_index: usize) -> bool {
        (self.start_line..=self.end_line).contains(&line_index)
    }
}

/// Splits source files into [`FunctionUnit`]s.
#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    max_depth: usize,
}

impl Segmenter {
    /// Creates a segmenter that inspects nodes up to `max_depth` levels below the root.
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    /// Segments `source` using the grammar selected by `language_hint`.
    ///
    /// # Errors
    ///
    /// Returns [`ImdbugError::UnsupportedLanguage`] for unknown hints and
    /// [`ImdbugError::Parse`] if tree-sitter refuses the input.
    pub fn segment(&self, source: &str, language_hint: &str) -> Result<Vec<FunctionUnit>> {
        let language = Language::from_hint(language_hint)?;
        self.segment_language(source, language)
    }

    /// Segments `source` with an already resolved [`Language`].
    pub fn segment_language(&self, source: &str, language: Language) -> Result<Vec<FunctionUnit>> {
        let tree = parse(source, language)?;
        let lines: Vec<&str> = source.split_inclusive('\n').collect();

        let mut nodes = Vec::new();
        collect_functions(tree.root_node(), 1, self.max_depth, &mut nodes);

        let units: Vec<FunctionUnit> = nodes
            .iter()
            .filter_map(|node| slice_unit(node, &lines))
            .collect();

        log::debug!(
            "Segmented {} function(s) from {} line(s) of {}",
            units.len(),
            lines.len(),
            language
        );

        Ok(units)
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

/// Segments `source` with the default traversal depth.
pub fn segment(source: &str, language_hint: &str) -> Result<Vec<FunctionUnit>> {
    Segmenter::default().segment(source, language_hint)
}

/// Parses `source` with a parser cached for the current thread.
fn parse(source: &str, language: Language) -> Result<Tree> {
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();

        if !parsers.contains_key(&language) {
            let mut parser = Parser::new();
            parser
                .set_language(&language.grammar())
                .map_err(|e| ImdbugError::Parse(format!("cannot load {} grammar: {}", language, e)))?;
            parsers.insert(language, parser);
        }

        let parser = parsers
            .get_mut(&language)
            .ok_or_else(|| ImdbugError::Parse(format!("no parser for {}", language)))?;

        parser
            .parse(source, None)
            .ok_or_else(|| ImdbugError::Parse(format!("{} parser returned no tree", language)))
    })
}

/// Pre-order walk collecting function nodes, without descending into them.
///
/// `depth` is the level of `node`'s children; nodes deeper than `max_depth`
/// are never inspected.
fn collect_functions<'t>(node: Node<'t>, depth: usize, max_depth: usize, out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();

    for child in node.children(&mut cursor) {
        if FUNCTION_NODE_KINDS.contains(&child.kind()) {
            out.push(child);
            continue;
        }

        if depth < max_depth {
            collect_functions(child, depth + 1, max_depth, out);
        }
    }
}

/// Builds a unit from the node's own line span.
fn slice_unit(node: &Node<'_>, lines: &[&str]) -> Option<FunctionUnit> {
    if lines.is_empty() {
        return None;
    }

    let start = node.start_position();
    let end = node.end_position();

    // Macro definitions swallow their trailing newline and end at column 0.
    let mut end_line = if end.column == 0 && end.row > start.row {
        end.row - 1
    } else {
        end.row
    };
    end_line = end_line.min(lines.len() - 1);

    let start_line = start.row;
    if start_line > end_line {
        return None;
    }

    Some(FunctionUnit {
        text: lines[start_line..=end_line].concat(),
        start_line,
        end_line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const C_SOURCE: &str = "#include <stdio.h>\n\
\n\
static int add(int a, int b)\n\
{\n\
    return a + b;\n\
}\n\
\n\
int main(void)\n\
{\n\
    printf(\"%d\\n\", add(1, 2));\n\
    return 0;\n\
}\n";

    const CPP_SOURCE: &str = "namespace outer {\n\
namespace inner {\n\
class Widget {\n\
public:\n\
    int size() const {\n\
        return 4;\n\
    }\n\
};\n\
}\n\
}\n\
\n\
int free_function() { return 1; }\n";

    fn reslice(source: &str, unit: &FunctionUnit) -> String {
        source
            .split_inclusive('\n')
            .skip(unit.start_line)
            .take(unit.line_count())
            .collect()
    }

    #[test]
    fn test_segment_c_functions() {
        let units = segment(C_SOURCE, "c").unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!((units[0].start_line, units[0].end_line), (2, 5));
        assert_eq!((units[1].start_line, units[1].end_line), (7, 11));
        assert!(units[1].text.starts_with("int main(void)"));
    }

    #[test]
    fn test_units_ordered_and_disjoint() {
        for (source, hint) in [(C_SOURCE, "c"), (CPP_SOURCE, "cpp")] {
            let units = segment(source, hint).unwrap();
            for pair in units.windows(2) {
                assert!(pair[0].end_line < pair[1].start_line);
            }
        }
    }

    #[test]
    fn test_round_trip_slicing() {
        for (source, hint) in [(C_SOURCE, "c"), (CPP_SOURCE, "hpp")] {
            for unit in segment(source, hint).unwrap() {
                assert_eq!(reslice(source, &unit), unit.text);
            }
        }
    }

    #[test]
    fn test_nested_method_found() {
        let units = segment(CPP_SOURCE, "cc").unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!((units[0].start_line, units[0].end_line), (4, 6));
        assert_eq!(units[1].start_line, 11);
    }

    #[test]
    fn test_depth_bound_limits_search() {
        let shallow = Segmenter::new(2).segment(CPP_SOURCE, "cpp").unwrap();
        assert_eq!(shallow.len(), 1);
        assert_eq!(shallow[0].start_line, 11);
    }

    #[test]
    fn test_single_line_function() {
        let units = segment("int main(){return 0;}", "c").unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].start_line, 0);
        assert_eq!(units[0].end_line, 0);
        assert_eq!(units[0].text, "int main(){return 0;}");
    }

    #[test]
    fn test_function_like_macro() {
        let source = "#define SQUARE(x) ((x) * (x))\nint f(int v) { return SQUARE(v); }\n";
        let units = segment(source, "c").unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!((units[0].start_line, units[0].end_line), (0, 0));
        assert_eq!(units[1].start_line, 1);
    }

    #[test]
    fn test_empty_source() {
        assert!(segment("", "cpp").unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_language() {
        let err = segment("int main(){}", "xyz").unwrap_err();
        assert!(matches!(err, ImdbugError::UnsupportedLanguage(_)));
    }
}
