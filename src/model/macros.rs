//! Declaration macros for the chat data model.
//!
//! `record!` declares a struct together with its static [`Shape`] and the
//! positional slot conversions; `tagged!` does the same for string-tagged enums.
//!
//! [`Shape`]: crate::model::codec::Shape

/// Declares a record struct and its schema.
///
/// Each field is written as `pub name: Type => TypeDesc` with an optional
/// `, wire = "wireName"` rename.
macro_rules! record {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                pub $field:ident: $ty:ty => $desc:expr $(, wire = $wire:literal)?;
            )*
        }
    ) => {
        $(#[$meta])*
        pub struct $name {
            $(
                $(#[$field_meta])*
                pub $field: $ty,
            )*
        }

        impl $crate::model::codec::Record for $name {
            const SHAPE: &'static $crate::model::codec::Shape = &$crate::model::codec::Shape {
                name: stringify!($name),
                fields: &[
                    $(
                        $crate::model::codec::FieldDesc {
                            name: stringify!($field),
                            ty: $desc,
                        },
                    )*
                ],
                renames: &[ $( $( (stringify!($field), $wire), )? )* ],
            };

            fn to_slots(&self) -> Vec<$crate::model::codec::Slot> {
                vec![ $( $crate::model::codec::ToSlot::to_slot(&self.$field), )* ]
            }

            fn from_slots(
                slots: Vec<$crate::model::codec::Slot>,
            ) -> Result<Self, $crate::model::codec::CodecError> {
                let mut slots = slots.into_iter();
                Ok(Self {
                    $(
                        $field: $crate::model::codec::take_field(
                            <Self as $crate::model::codec::Record>::SHAPE,
                            stringify!($field),
                            slots.next(),
                        )?,
                    )*
                })
            }
        }

        impl $crate::model::codec::ToSlot for $name {
            fn to_slot(&self) -> $crate::model::codec::Slot {
                $crate::model::codec::Slot::Record($crate::model::codec::Record::to_slots(self))
            }
        }

        impl $crate::model::codec::FromSlot for $name {
            fn from_slot(slot: $crate::model::codec::Slot) -> Option<Self> {
                match slot {
                    $crate::model::codec::Slot::Record(slots) => {
                        <Self as $crate::model::codec::Record>::from_slots(slots).ok()
                    }
                    _ => None,
                }
            }
        }
    };
}

/// Declares a unit-only enum serialized as a string tag.
macro_rules! tagged {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $tag:literal,
            )*
        }
    ) => {
        $(#[$meta])*
        pub enum $name {
            $(
                $(#[$variant_meta])*
                $variant,
            )*
        }

        impl $name {
            pub const ENUM: $crate::model::codec::EnumDesc = $crate::model::codec::EnumDesc {
                name: stringify!($name),
                tags: &[ $( $tag, )* ],
            };

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $tag, )*
                }
            }

            pub fn from_tag(tag: &str) -> Option<Self> {
                match tag {
                    $( $tag => Some(Self::$variant), )*
                    _ => None,
                }
            }
        }

        impl $crate::model::codec::ToSlot for $name {
            fn to_slot(&self) -> $crate::model::codec::Slot {
                $crate::model::codec::Slot::Tag(self.as_str())
            }
        }

        impl $crate::model::codec::FromSlot for $name {
            fn from_slot(slot: $crate::model::codec::Slot) -> Option<Self> {
                match slot {
                    $crate::model::codec::Slot::Tag(tag) => Self::from_tag(tag),
                    _ => None,
                }
            }
        }
    };
}
