//! The value cell.
//!
//! A cell is the fixed-size slot every language value lives in: a leading
//! node-tag byte (so the pointer oracle can recognize cells), a flag
//! byte, and a `Content` sum carrying the kind and its payload. The
//! layout test at the bottom pins the total size.
//!
//! Two cell states are not values at all: `End`, which terminates a cell
//! sequence and permits only `is_end`, and `Trash`, the debug sentinel an
//! argument slot holds before fulfilment writes it. Asking either for a
//! kind is a bug and panics.

use crate::array::Array;
use crate::binding::{Binding, Specifier};
use crate::context::{Context, ContextSort};
use crate::error::CoreError;
use crate::func::FuncData;
use crate::kind::Kind;
use crate::node::{TAG_CELL, TAG_CELL_END};
use crate::symbol::Symbol;
use crate::typeset::Typeset;
use bitflags::bitflags;
use std::fmt;
use std::sync::Arc;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CellFlags: u8 {
        /// The cell came from literal source, not from evaluation.
        /// Part of the public contract: `quote` senses and preserves it.
        const UNEVALUATED = 1 << 0;
        /// The cell is a throw label; the thrown payload rides in the
        /// engine's thrown slot.
        const THROWN = 1 << 1;
        /// The scanner saw a newline before this cell (pretty-printing).
        const LINE = 1 << 2;
        /// A function stored with this flag dispatches as a lookback,
        /// taking its first argument from the evaluator's output slot.
        const ENFIXED = 1 << 3;
    }
}

/// Payload shared by all word kinds.
#[derive(Debug, Clone)]
pub struct WordPayload {
    pub symbol: Symbol,
    pub binding: Binding,
}

/// Payload shared by all array kinds: a position into a shared array.
#[derive(Debug, Clone)]
pub struct SeriesPayload {
    pub array: Arc<Array>,
    pub index: usize,
    pub binding: Binding,
}

/// Payload of a function cell. `exit` carries the frame stamp a
/// definitional return unwinds to.
#[derive(Debug, Clone)]
pub struct FunctionPayload {
    pub func: Arc<FuncData>,
    pub exit: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum Content {
    End,
    Trash,
    Void,
    Blank,
    Bar,
    LitBar,
    Logic(bool),
    Integer(i64),
    Decimal(f64),
    Percent(f64),
    Char(char),
    Pair(f64, f64),
    Word(WordPayload),
    SetWord(WordPayload),
    GetWord(WordPayload),
    LitWord(WordPayload),
    Refinement(WordPayload),
    Issue(WordPayload),
    Block(SeriesPayload),
    Group(SeriesPayload),
    Path(SeriesPayload),
    SetPath(SeriesPayload),
    GetPath(SeriesPayload),
    LitPath(SeriesPayload),
    Text(Arc<String>),
    File(Arc<String>),
    Tag(Arc<String>),
    Binary(Arc<Vec<u8>>),
    Object(Arc<Context>),
    ErrorCtx(Arc<Context>),
    FrameCtx(Arc<Context>),
    Function(FunctionPayload),
    Typeset(Typeset),
    Handle(usize),
}

/// Size the layout test pins `Cell` to. Content tops out at the series
/// payload (pointer + index + binding) plus its discriminant word; the
/// tag and flag bytes pad up to the payload's alignment.
pub const CELL_SIZE: usize = 48;

#[repr(C)]
#[derive(Clone)]
pub struct Cell {
    tag: u8,
    flags: CellFlags,
    content: Content,
}

impl Cell {
    fn new(content: Content) -> Cell {
        Cell {
            tag: TAG_CELL,
            flags: CellFlags::empty(),
            content,
        }
    }

    // -- constructors -----------------------------------------------------

    /// A full cell whose header is marked END.
    pub fn end() -> Cell {
        Cell {
            tag: TAG_CELL_END,
            flags: CellFlags::empty(),
            content: Content::End,
        }
    }

    /// The debug sentinel for not-yet-fulfilled slots.
    pub fn trash() -> Cell {
        Cell::new(Content::Trash)
    }

    pub fn void() -> Cell {
        Cell::new(Content::Void)
    }

    pub fn blank() -> Cell {
        Cell::new(Content::Blank)
    }

    pub fn bar() -> Cell {
        Cell::new(Content::Bar)
    }

    pub fn lit_bar() -> Cell {
        Cell::new(Content::LitBar)
    }

    pub fn logic(b: bool) -> Cell {
        Cell::new(Content::Logic(b))
    }

    pub fn integer(i: i64) -> Cell {
        Cell::new(Content::Integer(i))
    }

    pub fn decimal(d: f64) -> Cell {
        Cell::new(Content::Decimal(d))
    }

    pub fn percent(d: f64) -> Cell {
        Cell::new(Content::Percent(d))
    }

    pub fn char_(c: char) -> Cell {
        Cell::new(Content::Char(c))
    }

    pub fn pair(x: f64, y: f64) -> Cell {
        Cell::new(Content::Pair(x, y))
    }

    fn word_like(symbol: impl Into<Symbol>) -> WordPayload {
        WordPayload {
            symbol: symbol.into(),
            binding: Binding::Unbound,
        }
    }

    pub fn word(symbol: impl Into<Symbol>) -> Cell {
        Cell::new(Content::Word(Cell::word_like(symbol)))
    }

    pub fn set_word(symbol: impl Into<Symbol>) -> Cell {
        Cell::new(Content::SetWord(Cell::word_like(symbol)))
    }

    pub fn get_word(symbol: impl Into<Symbol>) -> Cell {
        Cell::new(Content::GetWord(Cell::word_like(symbol)))
    }

    pub fn lit_word(symbol: impl Into<Symbol>) -> Cell {
        Cell::new(Content::LitWord(Cell::word_like(symbol)))
    }

    pub fn refinement(symbol: impl Into<Symbol>) -> Cell {
        Cell::new(Content::Refinement(Cell::word_like(symbol)))
    }

    pub fn issue(symbol: impl Into<Symbol>) -> Cell {
        Cell::new(Content::Issue(Cell::word_like(symbol)))
    }

    fn series(array: Arc<Array>) -> SeriesPayload {
        SeriesPayload {
            array,
            index: 0,
            binding: Binding::Unbound,
        }
    }

    pub fn block(array: Arc<Array>) -> Cell {
        Cell::new(Content::Block(Cell::series(array)))
    }

    /// A block positioned mid-array.
    pub fn block_at(array: Arc<Array>, index: usize) -> Cell {
        Cell::new(Content::Block(SeriesPayload {
            array,
            index,
            binding: Binding::Unbound,
        }))
    }

    pub fn group(array: Arc<Array>) -> Cell {
        Cell::new(Content::Group(Cell::series(array)))
    }

    pub fn path(array: Arc<Array>) -> Cell {
        Cell::new(Content::Path(Cell::series(array)))
    }

    pub fn set_path(array: Arc<Array>) -> Cell {
        Cell::new(Content::SetPath(Cell::series(array)))
    }

    pub fn get_path(array: Arc<Array>) -> Cell {
        Cell::new(Content::GetPath(Cell::series(array)))
    }

    pub fn lit_path(array: Arc<Array>) -> Cell {
        Cell::new(Content::LitPath(Cell::series(array)))
    }

    pub fn text(s: impl Into<String>) -> Cell {
        Cell::new(Content::Text(Arc::new(s.into())))
    }

    pub fn file(s: impl Into<String>) -> Cell {
        Cell::new(Content::File(Arc::new(s.into())))
    }

    pub fn tag(s: impl Into<String>) -> Cell {
        Cell::new(Content::Tag(Arc::new(s.into())))
    }

    pub fn binary(bytes: Vec<u8>) -> Cell {
        Cell::new(Content::Binary(Arc::new(bytes)))
    }

    /// A context cell of the kind matching the context's sort.
    pub fn context(ctx: Arc<Context>) -> Cell {
        let content = match ctx.sort() {
            ContextSort::Object => Content::Object(ctx),
            ContextSort::Error => Content::ErrorCtx(ctx),
            ContextSort::Frame { .. } => Content::FrameCtx(ctx),
        };
        Cell::new(content)
    }

    pub fn function(func: Arc<FuncData>) -> Cell {
        Cell::new(Content::Function(FunctionPayload { func, exit: None }))
    }

    /// A function cell bound to exit a particular call (definitional
    /// return).
    pub fn function_with_exit(func: Arc<FuncData>, stamp: u64) -> Cell {
        Cell::new(Content::Function(FunctionPayload {
            func,
            exit: Some(stamp),
        }))
    }

    pub fn typeset(ts: Typeset) -> Cell {
        Cell::new(Content::Typeset(ts))
    }

    pub fn handle(raw: usize) -> Cell {
        Cell::new(Content::Handle(raw))
    }

    // -- header -----------------------------------------------------------

    pub fn flags(&self) -> CellFlags {
        self.flags
    }

    pub fn has_flag(&self, flag: CellFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn set_flag(&mut self, flag: CellFlags) {
        self.flags |= flag;
    }

    pub fn clear_flag(&mut self, flag: CellFlags) {
        self.flags -= flag;
    }

    /// Builder form of `set_flag`.
    pub fn with_flag(mut self, flag: CellFlags) -> Cell {
        self.flags |= flag;
        self
    }

    /// Mark this cell's header END. The payload becomes unreadable.
    pub fn set_end(&mut self) {
        self.tag = TAG_CELL_END;
        self.content = Content::End;
        self.flags = CellFlags::empty();
    }

    /// Legal on every cell, including end-marked ones.
    pub fn is_end(&self) -> bool {
        crate::node::byte_marks_end(self.tag) || matches!(self.content, Content::End)
    }

    pub fn is_trash(&self) -> bool {
        matches!(self.content, Content::Trash)
    }

    /// The cell's kind. Panics on end and trash cells: those reads are
    /// bugs, and the sum type makes them unreachable from safe consumers
    /// that go through `try_kind`.
    pub fn kind(&self) -> Kind {
        self.try_kind().unwrap_or_else(|| {
            if self.is_end() {
                panic!("kind read on an end cell")
            } else {
                panic!("kind read on a trash cell")
            }
        })
    }

    pub fn try_kind(&self) -> Option<Kind> {
        Some(match &self.content {
            Content::End | Content::Trash => return None,
            Content::Void => Kind::Void,
            Content::Blank => Kind::Blank,
            Content::Logic(_) => Kind::Logic,
            Content::Bar => Kind::Bar,
            Content::LitBar => Kind::LitBar,
            Content::Integer(_) => Kind::Integer,
            Content::Decimal(_) => Kind::Decimal,
            Content::Percent(_) => Kind::Percent,
            Content::Char(_) => Kind::Char,
            Content::Pair(_, _) => Kind::Pair,
            Content::Word(_) => Kind::Word,
            Content::SetWord(_) => Kind::SetWord,
            Content::GetWord(_) => Kind::GetWord,
            Content::LitWord(_) => Kind::LitWord,
            Content::Refinement(_) => Kind::Refinement,
            Content::Issue(_) => Kind::Issue,
            Content::Block(_) => Kind::Block,
            Content::Group(_) => Kind::Group,
            Content::Path(_) => Kind::Path,
            Content::SetPath(_) => Kind::SetPath,
            Content::GetPath(_) => Kind::GetPath,
            Content::LitPath(_) => Kind::LitPath,
            Content::Text(_) => Kind::Text,
            Content::File(_) => Kind::File,
            Content::Tag(_) => Kind::Tag,
            Content::Binary(_) => Kind::Binary,
            Content::Object(_) => Kind::Object,
            Content::ErrorCtx(_) => Kind::Error,
            Content::FrameCtx(_) => Kind::Frame,
            Content::Function(_) => Kind::Function,
            Content::Typeset(_) => Kind::Typeset,
            Content::Handle(_) => Kind::Handle,
        })
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    // -- conditional truth ------------------------------------------------

    /// Blank and logic false are the only conditionally false values.
    /// Void is neither true nor false and errors when asked.
    pub fn is_conditional_true(&self) -> Result<bool, CoreError> {
        match &self.content {
            Content::End | Content::Trash => panic!("conditional test on a non-value cell"),
            Content::Void => Err(CoreError::VoidConditional),
            Content::Blank => Ok(false),
            Content::Logic(b) => Ok(*b),
            _ => Ok(true),
        }
    }

    pub fn is_conditional_false(&self) -> Result<bool, CoreError> {
        Ok(!self.is_conditional_true()?)
    }

    // -- payload accessors ------------------------------------------------

    pub fn is_void(&self) -> bool {
        matches!(self.content, Content::Void)
    }

    pub fn is_blank(&self) -> bool {
        matches!(self.content, Content::Blank)
    }

    pub fn is_bar(&self) -> bool {
        matches!(self.content, Content::Bar)
    }

    pub fn as_logic(&self) -> Option<bool> {
        match self.content {
            Content::Logic(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.content {
            Content::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self.content {
            Content::Decimal(d) | Content::Percent(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self.content {
            Content::Char(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(s) | Content::File(s) | Content::Tag(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn word_payload(&self) -> Option<&WordPayload> {
        match &self.content {
            Content::Word(p)
            | Content::SetWord(p)
            | Content::GetWord(p)
            | Content::LitWord(p)
            | Content::Refinement(p)
            | Content::Issue(p) => Some(p),
            _ => None,
        }
    }

    fn word_payload_mut(&mut self) -> Option<&mut WordPayload> {
        match &mut self.content {
            Content::Word(p)
            | Content::SetWord(p)
            | Content::GetWord(p)
            | Content::LitWord(p)
            | Content::Refinement(p)
            | Content::Issue(p) => Some(p),
            _ => None,
        }
    }

    pub fn word_symbol(&self) -> Option<Symbol> {
        self.word_payload().map(|p| p.symbol)
    }

    pub fn series_payload(&self) -> Option<&SeriesPayload> {
        match &self.content {
            Content::Block(p)
            | Content::Group(p)
            | Content::Path(p)
            | Content::SetPath(p)
            | Content::GetPath(p)
            | Content::LitPath(p) => Some(p),
            _ => None,
        }
    }

    fn series_payload_mut(&mut self) -> Option<&mut SeriesPayload> {
        match &mut self.content {
            Content::Block(p)
            | Content::Group(p)
            | Content::Path(p)
            | Content::SetPath(p)
            | Content::GetPath(p)
            | Content::LitPath(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionPayload> {
        match &self.content {
            Content::Function(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_context(&self) -> Option<&Arc<Context>> {
        match &self.content {
            Content::Object(c) | Content::ErrorCtx(c) | Content::FrameCtx(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_typeset(&self) -> Option<&Typeset> {
        match &self.content {
            Content::Typeset(t) => Some(t),
            _ => None,
        }
    }

    // -- binding ----------------------------------------------------------

    pub fn binding(&self) -> Option<&Binding> {
        if let Some(p) = self.word_payload() {
            Some(&p.binding)
        } else {
            self.series_payload().map(|p| &p.binding)
        }
    }

    pub fn is_relative(&self) -> bool {
        self.binding().is_some_and(Binding::is_relative)
    }

    /// Rebind a word or array cell into a specific context.
    pub fn bind_to(&mut self, ctx: &Arc<Context>) {
        let binding = Binding::Specific(ctx.clone());
        if let Some(p) = self.word_payload_mut() {
            p.binding = binding;
        } else if let Some(p) = self.series_payload_mut() {
            p.binding = binding;
        }
    }

    /// Rebind a word or array cell relative to a function identity.
    pub fn bind_relative(&mut self, func: crate::func::FuncId) {
        let binding = Binding::Relative(func);
        if let Some(p) = self.word_payload_mut() {
            p.binding = binding;
        } else if let Some(p) = self.series_payload_mut() {
            p.binding = binding;
        }
    }

    /// Copy this cell into a freestanding one, resolving a relative
    /// binding through the specifier. Copying a specific cell is a plain
    /// clone; copying a relative cell without a matching frame specifier
    /// panics (see `Binding::resolve`).
    pub fn derelativize(&self, specifier: &Specifier) -> Cell {
        let mut out = self.clone();
        let relative = out.binding().is_some_and(Binding::is_relative);
        if relative {
            let resolved = self
                .binding()
                .expect("relative cell has a binding")
                .resolve(specifier)
                .expect("relative binding resolves to a context");
            out.bind_to(&resolved);
        }
        out
    }

    /// Same array kind and binding, retargeted at another array/index
    /// (deep-copy support).
    pub fn retarget_series(&self, array: Arc<Array>, index: usize) -> Cell {
        let mut out = self.clone();
        let payload = out
            .series_payload_mut()
            .expect("retarget_series on a non-array cell");
        payload.array = array;
        payload.index = index;
        out
    }

    /// The evaluated form of a literal kind: lit-word becomes word,
    /// lit-path becomes path, lit-bar becomes bar.
    pub fn unlit(&self) -> Cell {
        let content = match &self.content {
            Content::LitWord(p) => Content::Word(p.clone()),
            Content::LitPath(p) => Content::Path(p.clone()),
            Content::LitBar => Content::Bar,
            other => other.clone(),
        };
        Cell {
            tag: self.tag,
            flags: self.flags,
            content,
        }
    }
}

// Equality compares content (deeply for arrays), never flags or binding.
impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        contents_equal(&self.content, &other.content)
    }
}

fn contents_equal(a: &Content, b: &Content) -> bool {
    use Content::*;
    match (a, b) {
        (End, End) => true,
        (Trash, Trash) => true,
        (Void, Void) | (Blank, Blank) | (Bar, Bar) | (LitBar, LitBar) => true,
        (Logic(x), Logic(y)) => x == y,
        (Integer(x), Integer(y)) => x == y,
        (Decimal(x), Decimal(y)) | (Percent(x), Percent(y)) => x == y,
        (Char(x), Char(y)) => x == y,
        (Pair(ax, ay), Pair(bx, by)) => ax == bx && ay == by,
        (Word(x), Word(y))
        | (SetWord(x), SetWord(y))
        | (GetWord(x), GetWord(y))
        | (LitWord(x), LitWord(y))
        | (Refinement(x), Refinement(y))
        | (Issue(x), Issue(y)) => x.symbol == y.symbol,
        (Block(x), Block(y))
        | (Group(x), Group(y))
        | (Path(x), Path(y))
        | (SetPath(x), SetPath(y))
        | (GetPath(x), GetPath(y))
        | (LitPath(x), LitPath(y)) => series_equal(x, y),
        (Text(x), Text(y)) | (File(x), File(y)) | (Tag(x), Tag(y)) => x == y,
        (Binary(x), Binary(y)) => x == y,
        (Object(x), Object(y)) | (ErrorCtx(x), ErrorCtx(y)) | (FrameCtx(x), FrameCtx(y)) => {
            Arc::ptr_eq(x, y)
        }
        (Function(x), Function(y)) => x.func.id == y.func.id && x.exit == y.exit,
        (Typeset(x), Typeset(y)) => x == y,
        (Handle(x), Handle(y)) => x == y,
        _ => false,
    }
}

fn series_equal(a: &SeriesPayload, b: &SeriesPayload) -> bool {
    if Arc::ptr_eq(&a.array, &b.array) && a.index == b.index {
        return true;
    }
    let (alen, blen) = (a.array.len(), b.array.len());
    if alen.saturating_sub(a.index) != blen.saturating_sub(b.index) {
        return false;
    }
    for i in 0..alen.saturating_sub(a.index) {
        let (Some(x), Some(y)) = (a.array.get(a.index + i), b.array.get(b.index + i)) else {
            return false;
        };
        if x != y {
            return false;
        }
    }
    true
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_end() {
            return write!(f, "Cell(end)");
        }
        write!(f, "Cell({self})")
    }
}

impl fmt::Display for Cell {
    /// Minimal molding, enough for error messages and logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            Content::End => write!(f, "~end~"),
            Content::Trash => write!(f, "~trash~"),
            Content::Void => write!(f, "~void~"),
            Content::Blank => write!(f, "_"),
            Content::Bar => write!(f, "|"),
            Content::LitBar => write!(f, "'|"),
            Content::Logic(b) => write!(f, "{b}"),
            Content::Integer(i) => write!(f, "{i}"),
            Content::Decimal(d) => write!(f, "{d}"),
            Content::Percent(d) => write!(f, "{}%", d * 100.0),
            Content::Char(c) => write!(f, "#\"{c}\""),
            Content::Pair(x, y) => write!(f, "{x}x{y}"),
            Content::Word(p) => write!(f, "{}", p.symbol),
            Content::SetWord(p) => write!(f, "{}:", p.symbol),
            Content::GetWord(p) => write!(f, ":{}", p.symbol),
            Content::LitWord(p) => write!(f, "'{}", p.symbol),
            Content::Refinement(p) => write!(f, "/{}", p.symbol),
            Content::Issue(p) => write!(f, "#{}", p.symbol),
            Content::Block(p) => mold_series(f, p, "[", "]"),
            Content::Group(p) => mold_series(f, p, "(", ")"),
            Content::Path(p) | Content::SetPath(p) | Content::GetPath(p) | Content::LitPath(p) => {
                let (pre, post) = match self.content {
                    Content::SetPath(_) => ("", ":"),
                    Content::GetPath(_) => (":", ""),
                    Content::LitPath(_) => ("'", ""),
                    _ => ("", ""),
                };
                write!(f, "{pre}")?;
                for i in p.index..p.array.len() {
                    if i > p.index {
                        write!(f, "/")?;
                    }
                    if let Some(cell) = p.array.get(i) {
                        write!(f, "{cell}")?;
                    }
                }
                write!(f, "{post}")
            }
            Content::Text(s) => write!(f, "{s:?}"),
            Content::File(s) => write!(f, "%{s}"),
            Content::Tag(s) => write!(f, "<{s}>"),
            Content::Binary(b) => write!(f, "#{{{}}}", b.len()),
            Content::Object(_) => write!(f, "make object! [...]"),
            Content::ErrorCtx(_) => write!(f, "make error! [...]"),
            Content::FrameCtx(_) => write!(f, "make frame! [...]"),
            Content::Function(p) => match p.func.name {
                Some(name) => write!(f, ":{name}"),
                None => write!(f, "make function! [...]"),
            },
            Content::Typeset(_) => write!(f, "make typeset! [...]"),
            Content::Handle(h) => write!(f, "make handle! [{h:#x}]"),
        }
    }
}

fn mold_series(
    f: &mut fmt::Formatter<'_>,
    p: &SeriesPayload,
    open: &str,
    close: &str,
) -> fmt::Result {
    write!(f, "{open}")?;
    for i in p.index..p.array.len() {
        if i > p.index {
            write!(f, " ")?;
        }
        if let Some(cell) = p.array.get(i) {
            write!(f, "{cell}")?;
        }
    }
    write!(f, "{close}")
}
