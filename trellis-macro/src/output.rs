use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields};

pub fn derive_output(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match generate_output_impl(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn generate_output_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            Fields::Unit => return Ok(empty_output(input)),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "#[derive(Output)] needs named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "#[derive(Output)] can only be applied to structs",
            ));
        }
    };

    let mut idents = Vec::with_capacity(fields.len());
    let mut tags = Vec::with_capacity(fields.len());
    let mut members = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(field_name) = &field.ident else {
            continue;
        };
        let ident = field_name.to_string().trim_start_matches("r#").to_uppercase();
        let const_name = format_ident!("{}", ident, span = field_name.span());
        let ty = &field.ty;
        tags.push(quote! {
            pub const #const_name: ::trellis::task::Tag<#ty> = ::trellis::task::Tag::new(#ident);
        });
        idents.push(ident);
        members.push(field_name);
    }

    Ok(quote! {
        impl #impl_generics ::trellis::task::Output for #struct_name #ty_generics #where_clause {
            const TAGS: &'static [&'static str] = &[#(#idents),*];
        }

        // Output structs are never built or read; the tags stand in for them.
        #[allow(dead_code)]
        impl #impl_generics #struct_name #ty_generics #where_clause {
            #(#tags)*

            #[doc(hidden)]
            fn __trellis_fields(self) -> Self {
                Self { #(#members: self.#members),* }
            }
        }
    })
}

fn empty_output(input: &DeriveInput) -> TokenStream2 {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    quote! {
        impl #impl_generics ::trellis::task::Output for #struct_name #ty_generics #where_clause {
            const TAGS: &'static [&'static str] = &[];
        }
    }
}
