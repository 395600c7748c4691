use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Meta};

/// Derive macro marking a register-layout struct as metadata-only.
///
/// The struct must be `#[repr(C)]` and every field must itself be
/// metadata-only: a `PalMetadataNoteEntry`, an array of them, or another
/// struct deriving `PalMetadata`. It must also derive `bytemuck::Pod`.
/// Violations are reported at compile time.
///
/// # Example
/// ```ignore
/// #[repr(C)]
/// #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, PalMetadata)]
/// struct PsRegs {
///     spi_ps_input_ena: PalMetadataNoteEntry,
///     spi_ps_input_addr: PalMetadataNoteEntry,
/// }
/// ```
#[proc_macro_derive(PalMetadata)]
pub fn derive_pal_metadata(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let struct_name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return syn::Error::new_spanned(
                struct_name,
                "PalMetadata can only be derived for structs",
            )
            .to_compile_error()
            .into();
        }
    };

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            &input.generics,
            "PalMetadata cannot be derived for generic structs",
        )
        .to_compile_error()
        .into();
    }

    if !has_repr_c(&input) {
        return syn::Error::new_spanned(
            struct_name,
            "PalMetadata requires #[repr(C)] so the layout is a plain sequence of entries",
        )
        .to_compile_error()
        .into();
    }

    let field_types: Vec<_> = match fields {
        Fields::Named(fields) => fields.named.iter().map(|f| &f.ty).collect(),
        Fields::Unnamed(fields) => fields.unnamed.iter().map(|f| &f.ty).collect(),
        Fields::Unit => Vec::new(),
    };

    let expanded = quote! {
        const _: () = {
            #[allow(dead_code)]
            fn assert_metadata_only<T: ::palmeta::register::MetadataOnly>() {}

            #[allow(dead_code)]
            fn assert_fields() {
                #(assert_metadata_only::<#field_types>();)*
            }

            assert!(
                ::core::mem::size_of::<#struct_name>()
                    % ::core::mem::size_of::<::palmeta::register::PalMetadataNoteEntry>()
                    == 0,
                "struct size is not a whole number of metadata entries"
            );
        };

        unsafe impl ::palmeta::register::MetadataOnly for #struct_name {}
    };

    TokenStream::from(expanded)
}

fn has_repr_c(input: &DeriveInput) -> bool {
    input.attrs.iter().any(|attr| {
        if !attr.path().is_ident("repr") {
            return false;
        }
        match &attr.meta {
            Meta::List(list) => list
                .tokens
                .to_string()
                .split(',')
                .any(|part| part.trim() == "C"),
            _ => false,
        }
    })
}
