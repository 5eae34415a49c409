//! Property-based tests for the multiline codec and notebook editing.

use commutable::{
    demultiline, remultiline, CellId, CodeCell, MarkdownCell, MultilineString, Notebook,
};
use proptest::prelude::*;

/// Text with a mix of `\n`, `\r\n` and blank lines.
fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof!["[a-zA-Z0-9 #*_]{0,12}", Just(String::new())],
        0..8,
    )
    .prop_flat_map(|lines| {
        let count = lines.len();
        (
            Just(lines),
            prop::collection::vec(prop_oneof!["\n", "\r\n"], count),
        )
    })
    .prop_map(|(lines, endings)| {
        lines
            .into_iter()
            .zip(endings)
            .map(|(line, ending)| format!("{}{}", line, ending))
            .collect::<String>()
    })
    .prop_flat_map(|text| {
        "[a-z]{0,5}".prop_map(move |tail| format!("{}{}", text, tail))
    })
}

fn notebook_strategy() -> impl Strategy<Value = Notebook> {
    prop::collection::vec(("[a-z]{1,8}", any::<bool>()), 0..6).prop_map(|cells| {
        cells
            .into_iter()
            .enumerate()
            .fold(Notebook::new(), |notebook, (i, (source, code))| {
                let id = CellId::from(format!("cell-{}", i));
                if code {
                    notebook.append_cell(CodeCell::new(source), Some(id))
                } else {
                    notebook.append_cell(MarkdownCell::new(source), Some(id))
                }
            })
    })
}

proptest! {
    #[test]
    fn demultiline_inverts_remultiline(text in text_strategy()) {
        let lines = remultiline(text.as_str());
        prop_assert!(lines.iter().all(|line| !line.is_empty()));
        prop_assert_eq!(demultiline(&MultilineString::Lines(lines)), text);
    }

    #[test]
    fn remultiline_fragments_end_at_newlines(text in text_strategy()) {
        let lines = remultiline(text.as_str());
        if let Some((_, head)) = lines.split_last() {
            prop_assert!(head.iter().all(|line| line.ends_with('\n')));
        }
        let again = remultiline(MultilineString::Lines(lines.clone()));
        prop_assert_eq!(again, lines.clone());
        prop_assert_eq!(remultiline(demultiline(&MultilineString::Lines(lines.clone()))), lines);
    }

    #[test]
    fn append_then_delete_restores_notebook(
        notebook in notebook_strategy(),
        source in "[a-z]{0,8}"
    ) {
        let id = CellId::from("appended");
        let appended = notebook.append_cell(CodeCell::new(source), Some(id.clone()));
        prop_assert_eq!(appended.len(), notebook.len() + 1);
        prop_assert_eq!(appended.delete_cell(&id), notebook);
    }

    #[test]
    fn deleting_flag_round_trips(
        notebook in notebook_strategy(),
        pick in any::<prop::sample::Index>()
    ) {
        prop_assume!(!notebook.is_empty());
        let id = notebook.cell_order()[pick.index(notebook.len())].clone();

        let marked = notebook.mark_cell_deleting(&id).unwrap();
        prop_assert!(marked.cell(&id).unwrap().metadata().is_deleting());
        prop_assert_eq!(marked.cell_order(), notebook.cell_order());

        let unmarked = marked.mark_cell_not_deleting(&id).unwrap();
        prop_assert_eq!(unmarked, notebook);
    }

    #[test]
    fn insert_after_places_cell_next(
        notebook in notebook_strategy(),
        pick in any::<prop::sample::Index>()
    ) {
        prop_assume!(!notebook.is_empty());
        let prior = notebook.cell_order()[pick.index(notebook.len())].clone();
        let id = CellId::from("inserted");

        let inserted = notebook.insert_cell_after(CodeCell::default(), id.clone(), &prior);
        let at = inserted.cell_order().iter().position(|existing| existing == &prior).unwrap();
        prop_assert_eq!(&inserted.cell_order()[at + 1], &id);
        prop_assert_eq!(inserted.len(), notebook.len() + 1);
    }
}
