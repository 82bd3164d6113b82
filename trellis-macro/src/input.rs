use darling::ast::Data;
use darling::util::{Flag, Ignored};
use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, GenericArgument, Ident, PathArguments, Type};

#[derive(FromDeriveInput)]
#[darling(attributes(input), supports(struct_named))]
struct InputStruct {
    ident: Ident,
    generics: syn::Generics,
    data: Data<Ignored, InputField>,
}

#[derive(FromField)]
#[darling(attributes(input))]
struct InputField {
    ident: Option<Ident>,
    ty: Type,
    #[darling(default)]
    rename: Option<String>,
    multi: Flag,
    #[darling(default)]
    list: Option<String>,
}

pub fn derive_input(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match InputStruct::from_derive_input(&input).and_then(|parsed| generate_from_input(&parsed)) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.write_errors()),
    }
}

fn generate_from_input(input: &InputStruct) -> darling::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let fields = match &input.data {
        Data::Struct(fields) => &fields.fields,
        Data::Enum(_) => return Err(darling::Error::unsupported_shape("enum")),
    };

    let mut reads = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(field_name) = &field.ident else {
            return Err(darling::Error::unsupported_shape("tuple struct"));
        };
        if field.multi.is_present() && field.list.is_some() {
            return Err(
                darling::Error::custom("`multi` and `list` cannot be combined").with_span(field_name)
            );
        }
        if field.list.as_deref() == Some("") {
            return Err(darling::Error::custom("`list` separator cannot be empty").with_span(field_name));
        }

        let param = field
            .rename
            .clone()
            .unwrap_or_else(|| field_name.to_string());
        let multi = field.multi.is_present();
        let separator = match &field.list {
            Some(sep) => quote!(::core::option::Option::Some(#sep)),
            None => quote!(::core::option::Option::None),
        };
        let meta = quote! {
            ::trellis::input::InputMeta {
                multi_valued: #multi,
                separator: #separator,
            }
        };

        let read = match option_inner(&field.ty) {
            Some(inner) => quote!(input.get_with::<#inner>(#param, &#meta)?),
            None => {
                let ty = &field.ty;
                quote!(input.require_with::<#ty>(#param, &#meta)?)
            }
        };
        reads.push(quote!(#field_name: #read));
    }

    Ok(quote! {
        impl #impl_generics ::trellis::input::FromInput for #struct_name #ty_generics #where_clause {
            fn from_input(
                input: &::trellis::input::DynamicInput,
            ) -> ::trellis::error::Result<Self> {
                ::core::result::Result::Ok(Self {
                    #(#reads),*
                })
            }
        }
    })
}

/// The `T` of an `Option<T>` field.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => match args.args.first()? {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}
