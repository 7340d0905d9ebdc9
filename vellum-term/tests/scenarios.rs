//! End-to-end scenarios against the full byte pipeline
//!
//! Each test feeds raw bytes through the terminal exactly as a PTY read
//! would and asserts on the resulting grid, cursor, history or replies.

use vellum_core::{CellAttributes, Color, Dimensions, UnderlineStyle};
use vellum_parser::Params;
use vellum_term::terminal::apply_sgr;
use vellum_term::Terminal;

fn term(cols: usize, rows: usize) -> Terminal {
    Terminal::new(Dimensions::new(cols, rows))
}

fn cell_char(term: &Terminal, row: usize, col: usize) -> char {
    term.screen().line(row).cell(col).display_char()
}

#[test]
fn cup_and_print() {
    let mut term = term(80, 24);
    term.process(b"\x1b[2;3HXY");
    assert_eq!(cell_char(&term, 1, 2), 'X');
    assert_eq!(cell_char(&term, 1, 3), 'Y');
    assert_eq!(term.screen().cursor().row, 1);
    assert_eq!(term.screen().cursor().col, 4);
}

#[test]
fn autowrap_marks_continuation() {
    let mut term = term(3, 3);
    term.process(b"ABCD");
    assert_eq!(term.screen().line(0).text(), "ABC");
    assert_eq!(term.screen().line(1).text(), "D");
    assert!(term.screen().line(1).flags.wrapped);
    assert!(!term.screen().line(0).flags.wrapped);
    assert_eq!(term.screen().cursor().row, 1);
    assert_eq!(term.screen().cursor().col, 1);
}

#[test]
fn scroll_pushes_history() {
    let mut term = term(2, 2);
    term.process(b"1\r\n2\r\n3");
    assert_eq!(term.screen().scrollback().len(), 1);
    assert_eq!(
        term.screen().scrollback().get(0).map(|l| l.text()),
        Some("1".to_string())
    );
    assert_eq!(term.screen().line(0).text(), "2");
    assert_eq!(term.screen().line(1).text(), "3");
}

#[test]
fn sgr_truecolor() {
    let mut term = term(10, 2);
    term.process(b"\x1b[38;2;10;20;30mX\x1b[0mY");
    let x = term.screen().line(0).cell(0);
    assert_eq!(
        x.attrs.fg,
        Color::Rgb {
            r: 10,
            g: 20,
            b: 30
        }
    );
    let y = term.screen().line(0).cell(1);
    assert_eq!(y.attrs.fg, Color::Default);
}

#[test]
fn margin_scroll_produces_no_history() {
    let mut term = term(1, 5);
    term.process(b"\x1b[1;1HA\x1b[2;1HB\x1b[3;1HC\x1b[4;1HD\x1b[5;1HE");
    term.process(b"\x1b[2;4r");
    term.process(b"\n\n\n\n");
    assert_eq!(term.screen().line(0).text(), "A");
    assert_eq!(term.screen().line(1).text(), "C");
    assert_eq!(term.screen().line(2).text(), "D");
    assert!(term.screen().line(3).is_empty());
    assert_eq!(term.screen().line(4).text(), "E");
    assert!(term.screen().scrollback().is_empty());
}

#[test]
fn osc8_hyperlink() {
    let mut term = term(20, 2);
    term.process(b"\x1b]8;id=x;https://e/\x1b\\A\x1b]8;;\x1b\\B");

    let a = term.screen().line(0).cell(0);
    assert_eq!(a.display_char(), 'A');
    assert_ne!(a.hyperlink_id, 0);
    let link = term.hyperlinks().get(a.hyperlink_id).expect("link");
    assert_eq!(link.uri, "https://e/");
    assert_eq!(link.user_id, "x");

    let b = term.screen().line(0).cell(1);
    assert_eq!(b.display_char(), 'B');
    assert_eq!(b.hyperlink_id, 0);
}

#[test]
fn alt_screen_roundtrip() {
    let mut term = term(20, 5);
    term.process(b"keep\x1b[1m\x1b[3;4H");
    let row_before = term.screen().cursor().row;
    let col_before = term.screen().cursor().col;
    let text_before = term.snapshot().screen_text();

    term.process(b"\x1b[?1049h");
    term.process(b"ALT");
    assert_eq!(term.screen().line(0).text(), "ALT");
    term.process(b"\x1b[?1049l");

    assert_eq!(term.snapshot().screen_text(), text_before);
    assert_eq!(term.screen().cursor().row, row_before);
    assert_eq!(term.screen().cursor().col, col_before);
    assert!(term.screen().cursor().attrs.bold);
    assert!(!term.snapshot().screen_text().contains("ALT"));
}

#[test]
fn cursor_always_in_bounds() {
    let mut term = term(5, 3);
    for input in [
        b"\x1b[99;99H".as_slice(),
        b"\x1b[99A",
        b"\x1b[99B",
        b"\x1b[99C",
        b"\x1b[99D",
        b"\x1b[99d",
        b"\x1b[99G",
        b"wrap around the edge of the page repeatedly",
        b"\x1b[0;0H",
    ] {
        term.process(input);
        assert!(term.screen().cursor().row < 3);
        assert!(term.screen().cursor().col < 5);
    }
}

#[test]
fn full_page_scroll_history_accounting() {
    let mut term = term(4, 3);
    let before = term.screen().scrollback().len();
    term.process(b"\x1b[5S");
    // Scrolling the full page by n grows history by exactly min(n, cap)
    assert_eq!(term.screen().scrollback().len(), before + 3.min(5));
}

#[test]
fn inflated_lines_cover_every_column() {
    let mut term = term(6, 2);
    term.process(b"ab\x1b[1mcd");
    for row in 0..2 {
        assert_eq!(term.screen().line(row).to_cells().len(), 6);
    }
}

#[test]
fn decsc_decrc_restores_everything() {
    let mut term = term(20, 5);
    term.process(b"\x1b[2;3H\x1b[1;31m\x1b(0\x1b[?7l");
    term.process(b"\x1b]8;id=z;https://x/\x1b\\");
    let saved_cursor = term.screen().cursor().clone();
    let saved_wrap = term.screen().modes().auto_wrap;

    term.process(b"\x1b7");
    term.process(b"\x1b[4;4H\x1b[0m\x1b(B\x1b[?7h\x1b]8;;\x1b\\x");
    term.process(b"\x1b8");

    let restored = term.screen().cursor();
    assert_eq!(restored.row, saved_cursor.row);
    assert_eq!(restored.col, saved_cursor.col);
    assert_eq!(restored.attrs, saved_cursor.attrs);
    assert_eq!(restored.charset, saved_cursor.charset);
    assert_eq!(restored.hyperlink_id, saved_cursor.hyperlink_id);
    assert_eq!(term.screen().modes().auto_wrap, saved_wrap);
}

#[test]
fn mode_set_is_idempotent() {
    let mut term = term(10, 3);
    term.process(b"\x1b[?2004h");
    let once = term.screen().modes().clone();
    term.process(b"\x1b[?2004h");
    assert_eq!(term.screen().modes(), &once);
}

#[test]
fn mode_save_restore_stack() {
    let mut term = term(10, 3);
    term.process(b"\x1b[?25l");
    term.process(b"\x1b[?25s");
    term.process(b"\x1b[?25h");
    term.process(b"\x1b[?25l");
    term.process(b"\x1b[?25r");
    assert!(!term.screen().modes().cursor_visible);
}

#[test]
fn ascii_roundtrip_through_grid() {
    let text = "The quick brown fox jumps";
    let mut term = term(40, 4);
    term.process(text.as_bytes());
    assert_eq!(term.screen().line(0).text(), text);
}

#[test]
fn reflow_roundtrip_preserves_content() {
    let mut term = term(8, 4);
    term.process(b"abcdefghij");
    let before = term.snapshot().screen_text();
    term.resize_screen(5, 4, None);
    term.resize_screen(8, 4, None);
    assert_eq!(term.snapshot().screen_text(), before);
}

#[test]
fn sgr_matches_isolated_parse() {
    let cases: &[&[u8]] = &[
        b"1;4;31",
        b"38;5;196;48;5;21",
        b"4:3;58;2;1;2;3",
        b"38:2::10:20:30",
        b"2;9;53",
    ];
    for case in cases {
        let mut input = b"\x1b[".to_vec();
        input.extend_from_slice(case);
        input.push(b'm');
        input.push(b'Z');

        let mut term = term(10, 2);
        term.process(&input);
        let cell_attrs = term.screen().line(0).cell(0).attrs;

        let mut expected = CellAttributes::default();
        apply_sgr(&Params::parse(case), &mut expected);
        assert_eq!(cell_attrs, expected, "case {:?}", case);
    }
}

#[test]
fn sgr_colon_subparams() {
    let mut term = term(10, 2);
    term.process(b"\x1b[4:3mX");
    assert_eq!(
        term.screen().line(0).cell(0).attrs.underline,
        UnderlineStyle::Curly
    );

    let mut term2 = term2_helper();
    term2.process(b"\x1b[58:5:9mY");
    assert_eq!(
        term2.screen().line(0).cell(0).attrs.underline_color,
        Color::Indexed(9)
    );
}

fn term2_helper() -> Terminal {
    Terminal::new(Dimensions::new(10, 2))
}

#[test]
fn cursor_position_report() {
    let mut term = term(80, 24);
    term.process(b"\x1b[5;7H\x1b[6n");
    assert_eq!(term.take_replies(), b"\x1b[5;7R".to_vec());

    term.process(b"\x1b[?6n");
    assert_eq!(term.take_replies(), b"\x1b[?5;7R".to_vec());
}

#[test]
fn device_attributes() {
    let mut term = term(80, 24);
    term.process(b"\x1b[c");
    let reply = term.take_replies();
    assert!(reply.starts_with(b"\x1b[?62"));

    term.process(b"\x1b[>c");
    let reply = term.take_replies();
    assert!(reply.starts_with(b"\x1b[>61"));

    term.process(b"\x1b[>q");
    let reply = String::from_utf8(term.take_replies()).unwrap();
    assert!(reply.contains("vellum"));
}

#[test]
fn decrqm_reports() {
    let mut term = term(80, 24);
    term.process(b"\x1b[?2004$p");
    assert_eq!(term.take_replies(), b"\x1b[?2004;2$y".to_vec());
    term.process(b"\x1b[?2004h\x1b[?2004$p");
    assert_eq!(term.take_replies(), b"\x1b[?2004;1$y".to_vec());
    term.process(b"\x1b[?31337$p");
    assert_eq!(term.take_replies(), b"\x1b[?31337;0$y".to_vec());
}

#[test]
fn decrqss_replies() {
    let mut term = term(80, 24);
    term.process(b"\x1bP$qm\x1b\\");
    assert_eq!(term.take_replies(), b"\x1bP1$r0m\x1b\\".to_vec());

    term.process(b"\x1b[1;31m\x1bP$qm\x1b\\");
    assert_eq!(term.take_replies(), b"\x1bP1$r0;1;31m\x1b\\".to_vec());

    term.process(b"\x1b[3;10r\x1bP$qr\x1b\\");
    assert_eq!(term.take_replies(), b"\x1bP1$r3;10r\x1b\\".to_vec());

    term.process(b"\x1bP$qz\x1b\\");
    assert_eq!(term.take_replies(), b"\x1bP0$r\x1b\\".to_vec());
}

#[test]
fn xtgettcap_lookup() {
    let mut term = term(80, 24);
    // "TN" hex-encoded is 544E
    term.process(b"\x1bP+q544E\x1b\\");
    let reply = String::from_utf8(term.take_replies()).unwrap();
    assert!(reply.starts_with("\x1bP1+r"));
    assert!(reply.contains('='));
}

#[test]
fn window_ops() {
    let mut term = term(80, 24);
    term.process(b"\x1b[18t");
    assert_eq!(term.take_replies(), b"\x1b[8;24;80t".to_vec());
}

#[test]
fn title_stack() {
    let mut term = term(80, 24);
    term.process(b"\x1b]2;first\x07");
    assert_eq!(term.title(), "first");
    term.process(b"\x1b[22t");
    term.process(b"\x1b]2;second\x07");
    assert_eq!(term.title(), "second");
    term.process(b"\x1b[23t");
    assert_eq!(term.title(), "first");
}

#[test]
fn capture_buffer_chunks() {
    let mut term = term(10, 2);
    term.process(b"hello");
    term.process(b"\x1b[>0;1t");
    let reply = String::from_utf8(term.take_replies()).unwrap();
    assert!(reply.contains("\x1b^314;hello"));
    assert!(reply.ends_with("\x1b^314;\x1b\\"));
}

#[test]
fn dec_special_graphics() {
    let mut term = term(10, 2);
    term.process(b"\x1b(0lqk\x1b(B");
    assert_eq!(term.screen().line(0).text(), "┌─┐");
}

#[test]
fn alignment_pattern() {
    let mut term = term(4, 2);
    term.process(b"\x1b#8");
    assert_eq!(term.screen().line(0).text(), "EEEE");
    assert_eq!(term.screen().line(1).text(), "EEEE");
}

#[test]
fn tab_stops_default_width() {
    let mut term = term(40, 2);
    term.process(b"\tX");
    assert_eq!(cell_char(&term, 0, 8), 'X');
}

#[test]
fn selective_erase_end_to_end() {
    let mut term = term(12, 2);
    term.process(b"aa\x1b[1\"qBB\x1b[0\"qcc");
    term.process(b"\x1b[1;1H\x1b[?2K");
    assert_eq!(term.screen().line(0).text(), "  BB");
    term.process(b"\x1b[2K");
    assert!(term.screen().line(0).is_empty());
}

#[test]
fn sixel_image_placed() {
    let mut term = term(20, 8);
    term.process(b"\x1bP0;0;0q#0;2;100;0;0!10~-\x1b\\");
    assert_eq!(term.screen().images().len(), 1);
    assert!(term.screen().line(0).cell(0).image.is_some());
}

#[test]
fn insert_mode_shifts() {
    let mut term = term(10, 2);
    term.process(b"abc\x1b[1;1H\x1b[4hX\x1b[4l");
    assert_eq!(term.screen().line(0).text(), "Xabc");
}

#[test]
fn rectangular_ops_end_to_end() {
    let mut term = term(8, 4);
    // Fill a rect with 'x' (DECFRA: Pch;Pt;Pl;Pb;Pr)
    term.process(b"\x1b[120;1;1;2;4$x");
    assert_eq!(term.screen().line(0).text(), "xxxx");
    assert_eq!(term.screen().line(1).text(), "xxxx");
    // Copy it down (DECCRA)
    term.process(b"\x1b[1;1;2;4;1;3;1;1$v");
    assert_eq!(term.screen().line(2).text(), "xxxx");
    // Erase the original (DECERA)
    term.process(b"\x1b[1;1;2;4$z");
    assert!(term.screen().line(0).is_empty());
    assert_eq!(term.screen().line(2).text(), "xxxx");
}

#[test]
fn unknown_sequences_do_not_disturb_state() {
    let mut term = term(10, 3);
    term.process(b"ok");
    let before = term.snapshot().screen_text();
    term.process(b"\x1b[1;2;3%y");
    term.process(b"\x1b]7777;whatever\x07");
    term.process(b"\x1bP+z00\x1b\\");
    assert_eq!(term.snapshot().screen_text(), before);
    assert!(term.take_replies().is_empty());
}

#[test]
fn wide_chars_occupy_two_cells() {
    let mut term = term(10, 2);
    term.process("中A".as_bytes());
    assert_eq!(cell_char(&term, 0, 0), '中');
    assert!(term.screen().line(0).cell(1).is_continuation());
    assert_eq!(cell_char(&term, 0, 2), 'A');
}

#[test]
fn combining_marks_join_base() {
    let mut term = term(10, 2);
    term.process("e\u{0301}x".as_bytes());
    assert_eq!(term.screen().line(0).cell(0).content(), "e\u{0301}");
    assert_eq!(cell_char(&term, 0, 1), 'x');
}

#[test]
fn bracketed_paste_wrapping() {
    let mut term = term(10, 2);
    assert_eq!(term.encode_paste_input("hi"), b"hi".to_vec());
    term.process(b"\x1b[?2004h");
    assert_eq!(
        term.encode_paste_input("hi"),
        b"\x1b[200~hi\x1b[201~".to_vec()
    );
}

#[test]
fn focus_reports_gated_by_mode() {
    let mut term = term(10, 2);
    assert!(term.encode_focus_input(true).is_none());
    term.process(b"\x1b[?1004h");
    assert_eq!(term.encode_focus_input(true), Some(b"\x1b[I".to_vec()));
}
