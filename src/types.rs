//! The interned type lattice.
//!
//! Types are interned in a [`bumpalo`] arena so that equality and hashing
//! are pointer operations. A [`Ty`] handle is a reference into the arena;
//! two structurally equal types always intern to the same handle.
//!
//! The lattice is deliberately small: integers with a constant sub-lattice,
//! control and dead control, tuples for multi-output nodes, struct pointers,
//! and per-field memory slices.

use std::cell::RefCell;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;
use std::ptr;

use bumpalo::Bump;
use rustc_hash::{FxHashMap, FxHashSet};

/// Integer sub-lattice: all integers, no integers, or exactly one.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Int {
    Top,
    Bot,
    Constant(i64),
}

/// One struct field: source name, declared type, and the memory alias id
/// that colors every load and store against this field.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Field<'t> {
    pub fname: &'t str,
    pub ty: Ty<'t>,
    pub alias: u32,
}

/// A named struct with its interned field list.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct StructDef<'t> {
    pub name: &'t str,
    pub fields: &'t [Field<'t>],
}

impl<'t> StructDef<'t> {
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn get_field(&self, fname: &str) -> Option<&'t Field<'t>> {
        self.fields.iter().find(|f| f.fname == fname)
    }
}

/// Pointee lattice for struct pointers.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Obj<'t> {
    Top,
    Bot,
    Def(StructDef<'t>),
}

/// A struct pointer; `nil` admits the null value.
///
/// `Ptr { to: Top, nil: true }` is the bare null pointer. A declared but
/// uninitialized struct variable is bound to a null constant typed
/// `Ptr { to: Def(T), nil: true }` so field resolution still knows `T`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Ptr<'t> {
    pub to: Obj<'t>,
    pub nil: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Type<'t> {
    Bot,
    Top,
    Ctrl,
    XCtrl,
    Int(Int),
    Tuple(&'t [Ty<'t>]),
    Ptr(Ptr<'t>),
    /// One memory slice, colored by a field alias id.
    Mem(u32),
}

impl<'t> Type<'t> {
    /// True if this type names exactly one value.
    pub fn is_constant(&self) -> bool {
        match self {
            Type::Int(Int::Constant(_)) => true,
            Type::XCtrl => true,
            // The only constant pointer value is null.
            Type::Ptr(Ptr { to: Obj::Top, nil: true }) => true,
            _ => false,
        }
    }

    pub fn unwrap_int(&self) -> i64 {
        match self {
            Type::Int(Int::Constant(v)) => *v,
            _ => unreachable!("expected an integer constant"),
        }
    }
}

/// A handle to an interned type. Compares and hashes by address.
#[derive(Copy, Clone, Eq, Debug)]
pub struct Ty<'t>(&'t Type<'t>);

impl PartialEq for Ty<'_> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.0, other.0)
    }
}

impl std::hash::Hash for Ty<'_> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self.0 as *const Type).hash(state)
    }
}

impl<'t> Deref for Ty<'t> {
    type Target = Type<'t>;
    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl Display for Ty<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self.0, f)
    }
}

impl Display for Type<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bot => write!(f, "Bot"),
            Type::Top => write!(f, "Top"),
            Type::Ctrl => write!(f, "Ctrl"),
            Type::XCtrl => write!(f, "Xctrl"),
            Type::Int(Int::Bot) => write!(f, "IntBot"),
            Type::Int(Int::Top) => write!(f, "IntTop"),
            Type::Int(Int::Constant(v)) => write!(f, "{v}"),
            Type::Tuple(types) => {
                write!(f, "[")?;
                for (i, t) in types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "]")
            }
            Type::Ptr(Ptr { to: Obj::Top, nil: true }) => write!(f, "null"),
            Type::Ptr(Ptr { to, nil }) => {
                let q = if *nil { "?" } else { "" };
                match to {
                    Obj::Top => write!(f, "*TOP{q}"),
                    Obj::Bot => write!(f, "*BOT{q}"),
                    Obj::Def(sd) => write!(f, "*{}{q}", sd.name),
                }
            }
            Type::Mem(alias) => write!(f, "MEM#{alias}"),
        }
    }
}

/// Owns the intern tables for one compilation. All [`Ty`] handles borrow
/// from the arena passed to [`TypeStore::new`], so they stay valid for as
/// long as the store does.
pub struct TypeStore<'t> {
    arena: &'t Bump,
    interned: RefCell<FxHashMap<Type<'t>, Ty<'t>>>,
    strings: RefCell<FxHashSet<&'t str>>,

    pub bot: Ty<'t>,
    pub top: Ty<'t>,
    pub ctrl: Ty<'t>,
    pub xctrl: Ty<'t>,
    pub int_top: Ty<'t>,
    pub int_bot: Ty<'t>,
    pub int_zero: Ty<'t>,
    pub int_one: Ty<'t>,
    pub int_two: Ty<'t>,
    pub ptr_null: Ty<'t>,
    pub if_both: Ty<'t>,
    pub if_neither: Ty<'t>,
    pub if_true: Ty<'t>,
    pub if_false: Ty<'t>,
}

impl<'t> TypeStore<'t> {
    pub fn new(arena: &'t Bump) -> Self {
        let interned = RefCell::new(FxHashMap::default());
        let store = |t: Type<'t>| -> Ty<'t> {
            *interned
                .borrow_mut()
                .entry(t)
                .or_insert_with(|| Ty(arena.alloc(t)))
        };

        let bot = store(Type::Bot);
        let top = store(Type::Top);
        let ctrl = store(Type::Ctrl);
        let xctrl = store(Type::XCtrl);
        let int_top = store(Type::Int(Int::Top));
        let int_bot = store(Type::Int(Int::Bot));
        let int_zero = store(Type::Int(Int::Constant(0)));
        let int_one = store(Type::Int(Int::Constant(1)));
        let int_two = store(Type::Int(Int::Constant(2)));
        let ptr_null = store(Type::Ptr(Ptr { to: Obj::Top, nil: true }));
        let if_both = store(Type::Tuple(arena.alloc([ctrl, ctrl])));
        let if_neither = store(Type::Tuple(arena.alloc([xctrl, xctrl])));
        let if_true = store(Type::Tuple(arena.alloc([ctrl, xctrl])));
        let if_false = store(Type::Tuple(arena.alloc([xctrl, ctrl])));

        Self {
            arena,
            interned,
            strings: RefCell::new(FxHashSet::default()),
            bot,
            top,
            ctrl,
            xctrl,
            int_top,
            int_bot,
            int_zero,
            int_one,
            int_two,
            ptr_null,
            if_both,
            if_neither,
            if_true,
            if_false,
        }
    }

    fn intern(&self, t: Type<'t>) -> Ty<'t> {
        *self
            .interned
            .borrow_mut()
            .entry(t)
            .or_insert_with(|| Ty(self.arena.alloc(t)))
    }

    pub fn int(&self, value: i64) -> Ty<'t> {
        self.intern(Type::Int(Int::Constant(value)))
    }

    pub fn tuple(&self, elems: &[Ty<'t>]) -> Ty<'t> {
        let elems: &'t [Ty<'t>] = self.arena.alloc_slice_copy(elems);
        self.intern(Type::Tuple(elems))
    }

    pub fn ptr(&self, def: StructDef<'t>, nil: bool) -> Ty<'t> {
        self.intern(Type::Ptr(Ptr { to: Obj::Def(def), nil }))
    }

    pub fn mem(&self, alias: u32) -> Ty<'t> {
        self.intern(Type::Mem(alias))
    }

    /// Intern the field list of a struct under construction.
    pub fn fields(&self, fields: &[Field<'t>]) -> &'t [Field<'t>] {
        self.arena.alloc_slice_copy(fields)
    }

    /// Intern a string so it can serve as a scope key or node label.
    pub fn intern_str(&self, s: &str) -> &'t str {
        let mut strings = self.strings.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }
        let interned: &'t str = self.arena.alloc_str(s);
        strings.insert(interned);
        interned
    }

    /// Lattice meet: the most precise type that both `a` and `b` widen to.
    pub fn meet(&self, a: Ty<'t>, b: Ty<'t>) -> Ty<'t> {
        match (*a, *b) {
            _ if a == b => a,

            (Type::Bot, _) | (_, Type::Top) => a,
            (Type::Top, _) | (_, Type::Bot) => b,

            (Type::Ctrl, Type::XCtrl) => a,
            (Type::XCtrl, Type::Ctrl) => b,

            (Type::Int(ia), Type::Int(ib)) => match (ia, ib) {
                (Int::Bot, _) | (_, Int::Top) => a,
                (_, Int::Bot) | (Int::Top, _) => b,
                // Equal constants were caught by the identity test above.
                _ => self.int_bot,
            },

            (Type::Tuple(ta), Type::Tuple(tb)) if ta.len() == tb.len() => {
                let elems: Vec<Ty<'t>> = ta
                    .iter()
                    .zip(tb.iter())
                    .map(|(&x, &y)| self.meet(x, y))
                    .collect();
                self.tuple(&elems)
            }

            (Type::Ptr(pa), Type::Ptr(pb)) => {
                let to = match (pa.to, pb.to) {
                    (x, Obj::Top) | (Obj::Top, x) => x,
                    (Obj::Bot, _) | (_, Obj::Bot) => Obj::Bot,
                    (Obj::Def(da), Obj::Def(db)) if da == db => Obj::Def(da),
                    _ => Obj::Bot,
                };
                self.intern(Type::Ptr(Ptr { to, nil: pa.nil | pb.nil }))
            }

            (Type::Mem(ma), Type::Mem(mb)) if ma == mb => a,

            _ => self.bot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_pointer_stable() {
        let arena = Bump::new();
        let types = TypeStore::new(&arena);

        assert_eq!(types.int(42), types.int(42));
        assert_ne!(types.int(42), types.int(2));
        assert_eq!(types.int(0), types.int_zero);

        let t1 = types.tuple(&[types.ctrl, types.int_bot]);
        let t2 = types.tuple(&[types.ctrl, types.int_bot]);
        let t3 = types.tuple(&[types.ctrl, types.int_top]);
        assert_eq!(t1, t2);
        assert_ne!(t1, t3);

        assert_eq!(types.intern_str("x"), types.intern_str("x"));
    }

    #[test]
    fn meet_int_lattice() {
        let arena = Bump::new();
        let types = TypeStore::new(&arena);

        assert_eq!(types.meet(types.int(3), types.int(3)), types.int(3));
        assert_eq!(types.meet(types.int(3), types.int(4)), types.int_bot);
        assert_eq!(types.meet(types.int(3), types.int_top), types.int(3));
        assert_eq!(types.meet(types.int_bot, types.int(4)), types.int_bot);
        assert_eq!(types.meet(types.ctrl, types.xctrl), types.ctrl);
        assert_eq!(types.meet(types.int_bot, types.ctrl), types.bot);
    }

    #[test]
    fn meet_pointers() {
        let arena = Bump::new();
        let types = TypeStore::new(&arena);

        let fields = types.fields(&[Field { fname: "x", ty: types.int_bot, alias: 1 }]);
        let sd = StructDef { name: "P", fields };
        let p = types.ptr(sd, false);

        let merged = types.meet(p, types.ptr_null);
        assert_eq!(merged, types.ptr(sd, true));
        assert!(types.ptr_null.is_constant());
        assert!(!p.is_constant());
    }
}
