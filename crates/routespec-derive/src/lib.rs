/*!
Procedural macros for routespec type descriptors.

`#[derive(ApiSchema)]` describes a type's shape at compile time. It reads
`#[schema(..)]` attributes and the subset of `#[serde(..)]` attributes that
changes the wire shape (`rename`, `rename_all`, `skip`, `default`,
`skip_serializing_if`).
*/

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse_macro_input, parse_quote, Attribute, Data, DataEnum, DeriveInput, Fields, LitStr,
    Type,
};

/// Derive macro implementing `routespec::ApiSchema` for structs and unit-only enums
#[proc_macro_derive(ApiSchema, attributes(schema))]
pub fn derive_api_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    generate_api_schema_impl(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn generate_api_schema_impl(mut input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = input.ident.clone();
    let name_str = name.to_string();
    let container = ContainerAttrs::parse(&input.attrs)?;

    let body = match &input.data {
        Data::Struct(data) => generate_struct_descriptor(&name_str, &data.fields, &container)?,
        Data::Enum(data) => generate_enum_descriptor(data, &container)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "ApiSchema cannot be derived for union types",
            ));
        }
    };

    for param in input.generics.type_params_mut() {
        param.bounds.push(parse_quote!(::routespec::ApiSchema));
    }
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::routespec::ApiSchema for #name #ty_generics #where_clause {
            fn describe() -> ::routespec::TypeDescriptor {
                #body
            }
        }
    })
}

fn generate_struct_descriptor(
    type_name: &str,
    fields: &Fields,
    container: &ContainerAttrs,
) -> syn::Result<proc_macro2::TokenStream> {
    match fields {
        Fields::Named(named) => {
            let mut descriptors = Vec::new();

            for field in &named.named {
                let Some(ident) = field.ident.as_ref() else {
                    continue;
                };
                let ident_str = unraw(&ident.to_string());
                let attrs = FieldAttrs::parse(&field.attrs)?;
                let ty = &field.ty;

                let external = if attrs.skip {
                    None
                } else {
                    Some(
                        attrs
                            .name
                            .clone()
                            .or_else(|| attrs.rename.clone())
                            .unwrap_or_else(|| container.rename_all.apply(&ident_str)),
                    )
                };
                let omit_empty = attrs.omit_empty || is_option_type(ty);

                let name_tokens = optional_str(external.as_deref());
                let validate = optional_str(attrs.validate.as_deref());
                let doc = optional_str(attrs.doc.as_deref());
                let example = optional_str(attrs.example.as_deref());
                let format = optional_str(attrs.format.as_deref());

                descriptors.push(quote! {
                    ::routespec::FieldDescriptor::new(
                        #ident_str,
                        <#ty as ::routespec::ApiSchema>::describe,
                    )
                    .with_annotations(::routespec::FieldAnnotations {
                        name: #name_tokens,
                        omit_empty: #omit_empty,
                        validate: #validate,
                        doc: #doc,
                        example: #example,
                        format: #format,
                    })
                });
            }

            Ok(quote! {
                ::routespec::TypeDescriptor::Struct(::routespec::StructDescriptor {
                    name: #type_name,
                    fields: ::std::vec![#(#descriptors),*],
                })
            })
        }
        Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => {
            // Newtypes are transparent
            let ty = &unnamed.unnamed[0].ty;
            Ok(quote! {
                <#ty as ::routespec::ApiSchema>::describe()
            })
        }
        Fields::Unnamed(_) => Ok(quote! {
            ::routespec::TypeDescriptor::Unsupported(#type_name)
        }),
        Fields::Unit => Ok(quote! {
            ::routespec::TypeDescriptor::Absent
        }),
    }
}

fn generate_enum_descriptor(
    data: &DataEnum,
    container: &ContainerAttrs,
) -> syn::Result<proc_macro2::TokenStream> {
    let mut variants = Vec::new();

    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "ApiSchema can only be derived for enums with unit variants",
            ));
        }
        let attrs = FieldAttrs::parse(&variant.attrs)?;
        if attrs.skip {
            continue;
        }
        let ident = variant.ident.to_string();
        variants.push(
            attrs
                .name
                .or(attrs.rename)
                .unwrap_or_else(|| container.rename_all.apply(&ident)),
        );
    }

    Ok(quote! {
        ::routespec::TypeDescriptor::Enum(::std::vec![#(#variants),*])
    })
}

fn optional_str(value: Option<&str>) -> proc_macro2::TokenStream {
    match value {
        Some(value) => quote! { ::std::option::Option::Some(#value) },
        None => quote! { ::std::option::Option::None },
    }
}

fn unraw(ident: &str) -> String {
    ident.strip_prefix("r#").unwrap_or(ident).to_string()
}

/// Helper function to check if a type is Option<T>
fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

/// Attributes on a field or enum variant
#[derive(Default)]
struct FieldAttrs {
    name: Option<String>,
    rename: Option<String>,
    skip: bool,
    omit_empty: bool,
    validate: Option<String>,
    doc: Option<String>,
    example: Option<String>,
    format: Option<String>,
}

impl FieldAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut parsed = Self::default();
        let mut doc_lines = Vec::new();

        for attr in attrs {
            if attr.path().is_ident("schema") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("name") {
                        parsed.name = Some(meta.value()?.parse::<LitStr>()?.value());
                    } else if meta.path.is_ident("skip") {
                        parsed.skip = true;
                    } else if meta.path.is_ident("omit_empty") {
                        parsed.omit_empty = true;
                    } else if meta.path.is_ident("validate") {
                        parsed.validate = Some(meta.value()?.parse::<LitStr>()?.value());
                    } else if meta.path.is_ident("doc") {
                        parsed.doc = Some(meta.value()?.parse::<LitStr>()?.value());
                    } else if meta.path.is_ident("example") {
                        parsed.example = Some(meta.value()?.parse::<LitStr>()?.value());
                    } else if meta.path.is_ident("format") {
                        parsed.format = Some(meta.value()?.parse::<LitStr>()?.value());
                    } else {
                        return Err(meta.error("unsupported schema attribute"));
                    }
                    Ok(())
                })?;
            } else if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") {
                        if meta.input.peek(syn::Token![=]) {
                            parsed.rename = Some(meta.value()?.parse::<LitStr>()?.value());
                        } else {
                            meta.parse_nested_meta(|inner| {
                                if inner.path.is_ident("serialize") {
                                    parsed.rename = Some(inner.value()?.parse::<LitStr>()?.value());
                                } else {
                                    skip_meta_value(&inner)?;
                                }
                                Ok(())
                            })?;
                        }
                    } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                        parsed.skip = true;
                    } else if meta.path.is_ident("default") {
                        parsed.omit_empty = true;
                        skip_meta_value(&meta)?;
                    } else if meta.path.is_ident("skip_serializing_if") {
                        parsed.omit_empty = true;
                        skip_meta_value(&meta)?;
                    } else if meta.path.is_ident("flatten") {
                        return Err(meta.error("ApiSchema does not support #[serde(flatten)]"));
                    } else {
                        skip_meta_value(&meta)?;
                    }
                    Ok(())
                })?;
            } else if attr.path().is_ident("doc") {
                if let syn::Meta::NameValue(name_value) = &attr.meta {
                    if let syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(line),
                        ..
                    }) = &name_value.value
                    {
                        doc_lines.push(line.value().trim().to_string());
                    }
                }
            }
        }

        if parsed.doc.is_none() {
            let doc = doc_lines.join("\n").trim().to_string();
            if !doc.is_empty() {
                parsed.doc = Some(doc);
            }
        }

        Ok(parsed)
    }
}

/// Consume `= value` or `(..)` after a serde key we don't interpret
fn skip_meta_value(meta: &syn::meta::ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        content.parse::<proc_macro2::TokenStream>()?;
    }
    Ok(())
}

/// Container-level serde attributes
#[derive(Default)]
struct ContainerAttrs {
    rename_all: RenameRule,
}

impl ContainerAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut parsed = Self::default();
        for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    let rule = if meta.input.peek(syn::Token![=]) {
                        Some(meta.value()?.parse::<LitStr>()?)
                    } else {
                        let mut serialize = None;
                        meta.parse_nested_meta(|inner| {
                            if inner.path.is_ident("serialize") {
                                serialize = Some(inner.value()?.parse::<LitStr>()?);
                            } else {
                                skip_meta_value(&inner)?;
                            }
                            Ok(())
                        })?;
                        serialize
                    };
                    if let Some(rule) = rule {
                        parsed.rename_all = RenameRule::from_lit(&rule)?;
                    }
                } else {
                    skip_meta_value(&meta)?;
                }
                Ok(())
            })?;
        }
        Ok(parsed)
    }
}

#[derive(Default, Clone, Copy)]
enum RenameRule {
    #[default]
    None,
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn from_lit(lit: &LitStr) -> syn::Result<Self> {
        Ok(match lit.value().as_str() {
            "lowercase" => Self::Lower,
            "UPPERCASE" => Self::Upper,
            "PascalCase" => Self::Pascal,
            "camelCase" => Self::Camel,
            "snake_case" => Self::Snake,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnake,
            "kebab-case" => Self::Kebab,
            "SCREAMING-KEBAB-CASE" => Self::ScreamingKebab,
            _ => return Err(syn::Error::new_spanned(lit, "unknown rename_all rule")),
        })
    }

    /// Apply to a snake_case field or PascalCase variant identifier
    fn apply(&self, ident: &str) -> String {
        let words = split_words(ident);
        match self {
            Self::None => ident.to_string(),
            Self::Lower => ident.to_lowercase(),
            Self::Upper => ident.to_uppercase(),
            Self::Pascal => words.iter().map(|w| capitalize(w)).collect(),
            Self::Camel => words
                .iter()
                .enumerate()
                .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
                .collect(),
            Self::Snake => join_words(&words, "_", str::to_lowercase),
            Self::ScreamingSnake => join_words(&words, "_", str::to_uppercase),
            Self::Kebab => join_words(&words, "-", str::to_lowercase),
            Self::ScreamingKebab => join_words(&words, "-", str::to_uppercase),
        }
    }
}

fn split_words(ident: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for c in ident.chars() {
        if c == '_' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if c.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(c);
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn join_words(words: &[String], separator: &str, case: fn(&str) -> String) -> String {
    words
        .iter()
        .map(|w| case(w))
        .collect::<Vec<_>>()
        .join(separator)
}
