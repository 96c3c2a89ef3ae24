use std::collections::HashMap;

/// Local numbering starts high enough to stay clear of the low label
/// numbers that show up inside macro expansions.
const FIRST_LOCAL_LABEL: usize = 100;

#[derive(Debug, Clone, Copy)]
struct LabelDef {
    number: usize,
    line: usize,
}

/// Rewrites every global label in one fragment into a numeric local label
/// so that many unrelated fragments can be assembled as a single unit
/// without symbol clashes.
///
/// Label definitions (a trimmed line ending in `:`, ignoring a trailing
/// `#` comment) become `100:`, `101:`, ... in file order. Branch lines
/// (first byte `b`, at least two tokens) whose last token names a known
/// label get that token replaced by `<number>f` for a definition at or
/// after the reference, `<number>b` for one before it, following the
/// assembler's local-label addressing convention. Everything else passes
/// through with comments stripped and whitespace trimmed.
#[must_use]
pub fn isolate_labels(source: &str) -> String {
    let mut labels = HashMap::<String, LabelDef>::new();
    let mut number = FIRST_LOCAL_LABEL;
    let mut lines = Vec::new();

    for (index, raw) in source.split('\n').enumerate() {
        let stripped = raw.split('#').next().unwrap_or(raw).trim();
        match stripped.strip_suffix(':') {
            Some(name) => {
                labels.insert(name.to_string(), LabelDef { number, line: index });
                lines.push(format!("{number}:"));
                number += 1;
            }
            None => lines.push(stripped.to_string()),
        }
    }

    // Unknown targets pass through untouched; flagging them would need a
    // real branch-mnemonic table, since the first-byte test below also
    // matches lines like `branchl r12, ...` that take no label at all.
    let mut rewritten = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let mut parts: Vec<&str> = line
            .split(|c: char| c == ' ' || c == '\t')
            .filter(|part| !part.is_empty())
            .collect();
        let is_branch = parts.len() >= 2 && line.as_bytes().first() == Some(&b'b');
        let target = parts.last().copied().and_then(|name| labels.get(name));
        let local = match (is_branch, target) {
            (true, Some(def)) => {
                let direction = if index > def.line { 'b' } else { 'f' };
                format!("{}{}", def.number, direction)
            }
            _ => {
                rewritten.push(line.clone());
                continue;
            }
        };
        let last = parts.len() - 1;
        parts[last] = &local;
        rewritten.push(parts.join(" "));
    }

    rewritten.join("\r\n")
}

#[cfg(test)]
mod tests {
    use super::isolate_labels;
    use pretty_assertions::assert_eq;

    #[test]
    fn assigns_numbers_from_100_in_file_order() {
        let source = "start:\n  li r3, 1\nmiddle:\n  li r4, 2\nfinish:\n";
        let isolated = isolate_labels(source);
        assert_eq!(isolated, "100:\nli r3, 1\n101:\nli r4, 2\n102:\n".replace('\n', "\r\n"));
    }

    #[test]
    fn rewrites_backward_and_forward_branches() {
        let source = "top:\n  nop\n  b top\n  beq done\n  nop\ndone:\n  blr\n";
        let isolated = isolate_labels(source);
        let lines: Vec<&str> = isolated.split("\r\n").collect();
        assert_eq!(lines[0], "100:");
        assert_eq!(lines[2], "b 100b");
        assert_eq!(lines[3], "beq 101f");
        assert_eq!(lines[5], "101:");
        assert_eq!(lines[6], "blr");
    }

    #[test]
    fn loop_fragment_rewrites_both_branches_backward() {
        let source = "loop:\nb loop\nnop\nnop\nnop\nnop\nnop\nb loop\n";
        let isolated = isolate_labels(source);
        let lines: Vec<&str> = isolated.split("\r\n").collect();
        assert_eq!(lines[0], "100:");
        assert_eq!(lines[1], "b 100b");
        assert_eq!(lines[7], "b 100b");
        assert_eq!(lines.iter().filter(|line| **line == "nop").count(), 5);
    }

    #[test]
    fn strips_comments_and_surrounding_whitespace() {
        let source = "  entry:   # jump target\n\tmflr r0 # save link register\n# only a comment\n";
        let isolated = isolate_labels(source);
        assert_eq!(isolated, "100:\r\nmflr r0\r\n\r\n");
    }

    #[test]
    fn leaves_unknown_targets_and_non_branches_alone() {
        let source = "b somewhere_else\nstw r0, 4(r1)\nlabel:\nmr r3, r4\n";
        let isolated = isolate_labels(source);
        let lines: Vec<&str> = isolated.split("\r\n").collect();
        assert_eq!(lines[0], "b somewhere_else");
        assert_eq!(lines[1], "stw r0, 4(r1)");
        assert_eq!(lines[3], "mr r3, r4");
    }

    #[test]
    fn branch_needs_at_least_two_tokens() {
        // A bare mnemonic that happens to equal a label name is not a
        // reference to it.
        let source = "b:\nb\n";
        let isolated = isolate_labels(source);
        assert_eq!(isolated, "100:\r\nb\r\n");
    }

    #[test]
    fn duplicate_label_names_keep_the_later_definition() {
        let source = "spot:\nnop\nspot:\nb spot\n";
        let isolated = isolate_labels(source);
        let lines: Vec<&str> = isolated.split("\r\n").collect();
        assert_eq!(lines[0], "100:");
        assert_eq!(lines[2], "101:");
        assert_eq!(lines[3], "b 101b");
    }

    #[test]
    fn normalizes_branch_line_whitespace_only() {
        let source = "here:\n\tb\t \there\n\tadd  r3,  r3, r4\n";
        let isolated = isolate_labels(source);
        let lines: Vec<&str> = isolated.split("\r\n").collect();
        assert_eq!(lines[1], "b 100b");
        assert_eq!(lines[2], "add  r3,  r3, r4");
    }

    #[test]
    fn is_deterministic() {
        let source = "a:\nb a\nb:\nb b\nc:\nb c\n";
        assert_eq!(isolate_labels(source), isolate_labels(source));
    }
}
