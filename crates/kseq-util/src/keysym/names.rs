//! The static key-symbol name table.
//!
//! Single ASCII letters and digits are their own names and are resolved
//! arithmetically in [`super::from_name`], so they do not appear here.
//! Everything else a compose file commonly mentions does: printable ASCII
//! punctuation, the Latin-1 supplement, dead keys, modifiers, and a few
//! editing keys.

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

pub(super) static NAMES: &[(&str, u32)] = &[
    // ASCII punctuation
    ("space", 0x0020),
    ("exclam", 0x0021),
    ("quotedbl", 0x0022),
    ("numbersign", 0x0023),
    ("dollar", 0x0024),
    ("percent", 0x0025),
    ("ampersand", 0x0026),
    ("apostrophe", 0x0027),
    ("parenleft", 0x0028),
    ("parenright", 0x0029),
    ("asterisk", 0x002a),
    ("plus", 0x002b),
    ("comma", 0x002c),
    ("minus", 0x002d),
    ("period", 0x002e),
    ("slash", 0x002f),
    ("colon", 0x003a),
    ("semicolon", 0x003b),
    ("less", 0x003c),
    ("equal", 0x003d),
    ("greater", 0x003e),
    ("question", 0x003f),
    ("at", 0x0040),
    ("bracketleft", 0x005b),
    ("backslash", 0x005c),
    ("bracketright", 0x005d),
    ("asciicircum", 0x005e),
    ("underscore", 0x005f),
    ("grave", 0x0060),
    ("braceleft", 0x007b),
    ("bar", 0x007c),
    ("braceright", 0x007d),
    ("asciitilde", 0x007e),
    // Latin-1 supplement
    ("nobreakspace", 0x00a0),
    ("exclamdown", 0x00a1),
    ("cent", 0x00a2),
    ("sterling", 0x00a3),
    ("currency", 0x00a4),
    ("yen", 0x00a5),
    ("brokenbar", 0x00a6),
    ("section", 0x00a7),
    ("diaeresis", 0x00a8),
    ("copyright", 0x00a9),
    ("ordfeminine", 0x00aa),
    ("guillemotleft", 0x00ab),
    ("notsign", 0x00ac),
    ("hyphen", 0x00ad),
    ("registered", 0x00ae),
    ("macron", 0x00af),
    ("degree", 0x00b0),
    ("plusminus", 0x00b1),
    ("twosuperior", 0x00b2),
    ("threesuperior", 0x00b3),
    ("acute", 0x00b4),
    ("mu", 0x00b5),
    ("paragraph", 0x00b6),
    ("periodcentered", 0x00b7),
    ("cedilla", 0x00b8),
    ("onesuperior", 0x00b9),
    ("masculine", 0x00ba),
    ("guillemotright", 0x00bb),
    ("onequarter", 0x00bc),
    ("onehalf", 0x00bd),
    ("threequarters", 0x00be),
    ("questiondown", 0x00bf),
    ("Agrave", 0x00c0),
    ("Aacute", 0x00c1),
    ("Acircumflex", 0x00c2),
    ("Atilde", 0x00c3),
    ("Adiaeresis", 0x00c4),
    ("Aring", 0x00c5),
    ("AE", 0x00c6),
    ("Ccedilla", 0x00c7),
    ("Egrave", 0x00c8),
    ("Eacute", 0x00c9),
    ("Ecircumflex", 0x00ca),
    ("Ediaeresis", 0x00cb),
    ("Igrave", 0x00cc),
    ("Iacute", 0x00cd),
    ("Icircumflex", 0x00ce),
    ("Idiaeresis", 0x00cf),
    ("ETH", 0x00d0),
    ("Ntilde", 0x00d1),
    ("Ograve", 0x00d2),
    ("Oacute", 0x00d3),
    ("Ocircumflex", 0x00d4),
    ("Otilde", 0x00d5),
    ("Odiaeresis", 0x00d6),
    ("multiply", 0x00d7),
    ("Oslash", 0x00d8),
    ("Ugrave", 0x00d9),
    ("Uacute", 0x00da),
    ("Ucircumflex", 0x00db),
    ("Udiaeresis", 0x00dc),
    ("Yacute", 0x00dd),
    ("THORN", 0x00de),
    ("ssharp", 0x00df),
    ("agrave", 0x00e0),
    ("aacute", 0x00e1),
    ("acircumflex", 0x00e2),
    ("atilde", 0x00e3),
    ("adiaeresis", 0x00e4),
    ("aring", 0x00e5),
    ("ae", 0x00e6),
    ("ccedilla", 0x00e7),
    ("egrave", 0x00e8),
    ("eacute", 0x00e9),
    ("ecircumflex", 0x00ea),
    ("ediaeresis", 0x00eb),
    ("igrave", 0x00ec),
    ("iacute", 0x00ed),
    ("icircumflex", 0x00ee),
    ("idiaeresis", 0x00ef),
    ("eth", 0x00f0),
    ("ntilde", 0x00f1),
    ("ograve", 0x00f2),
    ("oacute", 0x00f3),
    ("ocircumflex", 0x00f4),
    ("otilde", 0x00f5),
    ("odiaeresis", 0x00f6),
    ("division", 0x00f7),
    ("oslash", 0x00f8),
    ("ugrave", 0x00f9),
    ("uacute", 0x00fa),
    ("ucircumflex", 0x00fb),
    ("udiaeresis", 0x00fc),
    ("yacute", 0x00fd),
    ("thorn", 0x00fe),
    ("ydiaeresis", 0x00ff),
    // Editing and control keys
    ("BackSpace", 0xff08),
    ("Tab", 0xff09),
    ("Linefeed", 0xff0a),
    ("Return", 0xff0d),
    ("Pause", 0xff13),
    ("Scroll_Lock", 0xff14),
    ("Escape", 0xff1b),
    ("Multi_key", 0xff20),
    ("Delete", 0xffff),
    ("Mode_switch", 0xff7e),
    ("Num_Lock", 0xff7f),
    // Modifier keys
    ("Shift_L", 0xffe1),
    ("Shift_R", 0xffe2),
    ("Control_L", 0xffe3),
    ("Control_R", 0xffe4),
    ("Caps_Lock", 0xffe5),
    ("Shift_Lock", 0xffe6),
    ("Meta_L", 0xffe7),
    ("Meta_R", 0xffe8),
    ("Alt_L", 0xffe9),
    ("Alt_R", 0xffea),
    ("Super_L", 0xffeb),
    ("Super_R", 0xffec),
    ("Hyper_L", 0xffed),
    ("Hyper_R", 0xffee),
    ("ISO_Lock", 0xfe01),
    ("ISO_Level2_Latch", 0xfe02),
    ("ISO_Level3_Shift", 0xfe03),
    ("ISO_Level3_Latch", 0xfe04),
    ("ISO_Level3_Lock", 0xfe05),
    ("ISO_Level5_Shift", 0xfe11),
    ("ISO_Level5_Latch", 0xfe12),
    ("ISO_Level5_Lock", 0xfe13),
    // Dead keys
    ("dead_grave", 0xfe50),
    ("dead_acute", 0xfe51),
    ("dead_circumflex", 0xfe52),
    ("dead_tilde", 0xfe53),
    ("dead_macron", 0xfe54),
    ("dead_breve", 0xfe55),
    ("dead_abovedot", 0xfe56),
    ("dead_diaeresis", 0xfe57),
    ("dead_abovering", 0xfe58),
    ("dead_doubleacute", 0xfe59),
    ("dead_caron", 0xfe5a),
    ("dead_cedilla", 0xfe5b),
    ("dead_ogonek", 0xfe5c),
    ("dead_iota", 0xfe5d),
    ("dead_voiced_sound", 0xfe5e),
    ("dead_semivoiced_sound", 0xfe5f),
    ("dead_belowdot", 0xfe60),
    ("dead_hook", 0xfe61),
    ("dead_horn", 0xfe62),
];

lazy_static! {
    pub(super) static ref NAME_TO_CODE: FxHashMap<&'static str, u32> =
        NAMES.iter().copied().collect();
    pub(super) static ref CODE_TO_NAME: FxHashMap<u32, &'static str> =
        NAMES.iter().map(|&(name, code)| (code, name)).collect();
}
