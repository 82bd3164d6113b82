use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

pub fn derive_input_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let enum_name = &input.ident;

    let Data::Enum(data) = &input.data else {
        return syn::Error::new_spanned(enum_name, "#[derive(InputEnum)] can only be applied to enums")
            .to_compile_error()
            .into();
    };
    if let Some(variant) = data.variants.iter().find(|v| !matches!(v.fields, Fields::Unit)) {
        return syn::Error::new_spanned(&variant.ident, "InputEnum variants cannot carry data")
            .to_compile_error()
            .into();
    }

    let variants: Vec<_> = data.variants.iter().map(|v| &v.ident).collect();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let expanded = quote! {
        impl #impl_generics ::trellis::input::InputEnum for #enum_name #ty_generics #where_clause {
            const VARIANT_NAMES: &'static [&'static str] = &[#(stringify!(#variants)),*];

            fn from_variant_name(name: &str) -> ::std::option::Option<Self> {
                match name {
                    #(stringify!(#variants) => ::std::option::Option::Some(Self::#variants),)*
                    _ => ::std::option::Option::None,
                }
            }

            fn variant_name(&self) -> &'static str {
                match *self {
                    #(Self::#variants => stringify!(#variants),)*
                }
            }
        }

        impl #impl_generics ::trellis::input::InputValue for #enum_name #ty_generics #where_clause {
            fn parse(
                raw: &str,
                _ctx: &::trellis::input::ParseContext<'_>,
            ) -> ::trellis::error::Result<Self> {
                ::trellis::input::parse_enum(raw)
            }
        }
    };
    TokenStream::from(expanded)
}
