use proc_macro::TokenStream;

mod input;
mod input_enum;
mod output;

/// Reads a struct from the request parameters.
///
/// Each named field is read from the parameter of the same name. `Option<T>`
/// fields may be absent; any other absent field fails with `MissingInput`.
///
/// Field attributes:
/// - `#[input(rename = "q")]` reads another parameter name
/// - `#[input(multi)]` collects every value sent under the name into a `Vec`
/// - `#[input(list = ",")]` splits a single value on the separator into a `Vec`;
///   the separator must not be empty
///
/// # Example
/// ```ignore
/// use trellis::Input;
///
/// #[derive(Input)]
/// pub struct SearchInput {
///     #[input(rename = "q")]
///     query: String,
///     page: Option<u32>,
///     #[input(multi)]
///     tag: Vec<String>,
/// }
/// ```
#[proc_macro_derive(Input, attributes(input))]
pub fn derive_input(input: TokenStream) -> TokenStream {
    input::derive_input(input)
}

/// Declares the output tags of a task.
///
/// Every field becomes a tag constant named after the upper-cased field; the
/// template sees it under the field name.
///
/// # Example
/// ```ignore
/// use trellis::Output;
///
/// #[derive(Output)]
/// pub struct GreetingOutput {
///     name: String,
/// }
///
/// // attrs.set(GreetingOutput::NAME, "World") binds `{{ name }}`
/// ```
#[proc_macro_derive(Output)]
pub fn derive_output(input: TokenStream) -> TokenStream {
    output::derive_output(input)
}

/// Parses a fieldless enum from a request parameter, matching the variant
/// names as declared without regard to case. Renames from other derives are
/// ignored.
///
/// # Example
/// ```ignore
/// use trellis::InputEnum;
///
/// #[derive(InputEnum)]
/// pub enum Sort {
///     Newest,
///     Oldest,
/// }
/// ```
#[proc_macro_derive(InputEnum)]
pub fn derive_input_enum(input: TokenStream) -> TokenStream {
    input_enum::derive_input_enum(input)
}
